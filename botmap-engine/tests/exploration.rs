//! End-to-end exploration of a scripted bot: a small shop flow with a reply
//! keyboard, an inline-button branch, an AI-answered prompt, throttling and
//! an unresponsive corner.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use botmap_core::action::Action;
use botmap_core::config::ExplorerConfig;
use botmap_core::error::TransportError;
use botmap_core::state::NodeStatus;
use botmap_engine::mock::{
    self, CollectingSink, NullMediaFetcher, ScriptedOracle, ScriptedTransport,
};
use botmap_engine::Explorer;

fn scripted_shop() -> Arc<ScriptedTransport> {
    let transport = Arc::new(ScriptedTransport::new());
    transport.on_text(
        "/start",
        vec![mock::reply_keyboard_update(
            1,
            "Welcome to the shop",
            &[&["Catalog", "Support"]],
        )],
    );
    transport.on_text(
        "Catalog",
        vec![mock::inline_keyboard_update(
            2,
            "Our products",
            &[&[("Buy socks", "buy:socks")], &[("Buy hats", "buy:hats")]],
        )],
    );
    transport.on_callback("buy:socks", vec![mock::text_update(3, "Socks ordered!")]);
    // The hats branch never answers.
    transport.on_text(
        "Support",
        vec![mock::reply_keyboard_update(
            4,
            "Describe your problem",
            &[&["Cancel"]],
        )],
    );
    transport.on_text(
        "My parcel is lost",
        vec![mock::text_update(5, "A human will reach out")],
    );
    transport.on_text("Cancel", vec![mock::text_update(6, "Welcome back")]);
    transport
}

#[tokio::test(start_paused = true)]
async fn explores_a_scripted_shop_end_to_end() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("botmap_engine=debug")
        .with_test_writer()
        .try_init();

    let transport = scripted_shop();
    // Throttle the very first stimulus to exercise the backoff path.
    transport.fail_once(
        "/start",
        TransportError::RateLimited {
            retry_after: Duration::from_secs(7),
        },
    );

    let oracle = Arc::new(ScriptedOracle::declining());
    oracle.propose_for("Describe your problem", "My parcel is lost");

    let sink = Arc::new(CollectingSink::default());

    let mut config = ExplorerConfig::new("shop_bot");
    config.min_wait_secs = 1.0;
    config.response_timeout_secs = 5.0;
    config.max_depth = 4;

    let mut explorer = Explorer::new(
        config,
        transport.clone(),
        oracle,
        Arc::new(NullMediaFetcher),
    )?
    .with_snapshot_sink(sink.clone());

    let root = explorer.run().await?;
    let store = explorer.store();

    // Root carries exactly the bootstrap stimulus.
    assert_eq!(
        store.node(root).actions_out,
        vec![Action::SendText { text: "/start".into() }]
    );

    // Welcome menu with its two reply buttons, both explored.
    let welcome = store.node(store.node(root).children[0]);
    assert_eq!(welcome.text, "Welcome to the shop");
    assert_eq!(welcome.children.len(), 2);

    // Catalog branch: socks ordered, hats timed out and was not expanded.
    let catalog = store.node(welcome.children[0]);
    assert_eq!(catalog.text, "Our products");
    let catalog_leaves: Vec<_> = catalog
        .children
        .iter()
        .map(|&id| store.node(id))
        .collect();
    assert_eq!(catalog_leaves.len(), 2);
    assert_eq!(catalog_leaves[0].text, "Socks ordered!");
    assert_eq!(catalog_leaves[1].status, NodeStatus::Timeout);
    assert!(catalog_leaves[1].children.is_empty());

    // Support branch: the oracle's reply was asked first, then the button.
    let support = store.node(welcome.children[1]);
    assert_eq!(
        support.actions_out[0],
        Action::SendAiText { text: "My parcel is lost".into() }
    );
    assert_eq!(support.children.len(), 2);
    assert_eq!(store.node(support.children[0]).text, "A human will reach out");
    assert_eq!(store.node(support.children[1]).text, "Welcome back");

    // The backoff fired the snapshot hook with the then-current tree.
    assert!(sink.views() >= 1);

    // Ids are unique and increasing; every non-root node has one parent.
    let rows = explorer.snapshot_rows();
    for pair in rows.windows(2) {
        assert!(pair[0].id < pair[1].id);
    }
    assert!(rows.iter().skip(1).all(|row| row.parent_id.is_some()));
    assert_eq!(rows[0].parent_id, None);

    // The flattened view serializes without a custom format.
    let json = serde_json::to_string(&rows)?;
    assert!(json.contains("\"send_text: /start\""));

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn restore_replays_are_invisible_in_the_final_tree() -> Result<()> {
    let transport = scripted_shop();
    let oracle = Arc::new(ScriptedOracle::declining());

    let mut config = ExplorerConfig::new("shop_bot");
    config.min_wait_secs = 0.0;
    config.response_timeout_secs = 2.0;

    let mut explorer = Explorer::new(
        config,
        transport.clone(),
        oracle,
        Arc::new(NullMediaFetcher),
    )?;
    explorer.run().await?;

    // Sibling exploration forced several /start replays...
    let replays = transport
        .sent()
        .iter()
        .filter(|key| key.as_str() == "/start")
        .count();
    assert!(replays > 1);

    // ...but the tree contains each discovered state exactly once: the
    // welcome menu is the root's only child.
    let store = explorer.store();
    assert_eq!(store.node(explorer.root()).children.len(), 1);

    Ok(())
}
