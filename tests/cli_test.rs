//! CLI integration tests
//!
//! Tests argument parsing and JSON output shapes for the reelcast CLI.

use clap::Parser;
use reelcast::catalog::parse_catalog;
use reelcast::cli::{CatalogNode, Cli, Command, ExitCode, JsonOutput, PlayInput};
use reelcast::models::CastDevice;
use reelcast::playback::RemotePlayerState;
use reelcast::stream::cast::parse_catt_status;
use serde_json::json;
use std::time::Duration;

const CATALOG: &str = r#"{
    "title": "Sample Videos",
    "categories": [{
        "name": "Shorts",
        "mp4": "https://host/mp4/",
        "images": "https://host/img/",
        "videos": [{
            "title": "Clip A",
            "image-480x270": "a.jpg",
            "sources": [{"type": "mp4", "url": "a.mp4"}]
        }]
    }]
}"#;

// =============================================================================
// Argument Parsing
// =============================================================================

mod parsing {
    use super::*;

    #[test]
    fn test_catalog_override_is_global() {
        let cli = Cli::try_parse_from([
            "reelcast",
            "browse",
            "--catalog",
            "https://x/c.json",
            "--depth",
            "1",
        ])
        .unwrap();
        assert_eq!(cli.catalog.as_deref(), Some("https://x/c.json"));
        match cli.command {
            Command::Browse(cmd) => {
                assert!(cmd.url.is_none());
                assert_eq!(cmd.depth, Some(1));
            }
            other => panic!("Expected Browse command, got {:?}", other),
        }
    }

    #[test]
    fn test_aliases() {
        let cli = Cli::try_parse_from(["reelcast", "p", "Clip A"]).unwrap();
        assert!(matches!(cli.command, Command::Play(_)));

        let cli = Cli::try_parse_from(["reelcast", "dev"]).unwrap();
        match cli.command {
            Command::Devices(cmd) => assert!(cmd.catt.is_none()),
            other => panic!("Expected Devices command, got {:?}", other),
        }
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["reelcast"]).is_err());
        assert!(Cli::try_parse_from(["reelcast", "info"]).is_err());
        assert!(Cli::try_parse_from(["reelcast", "play", "Clip A", "--start", "soon"]).is_err());
    }

    #[test]
    fn test_play_input_commands() {
        assert_eq!(PlayInput::parse("pause"), Some(PlayInput::TogglePause));
        assert_eq!(PlayInput::parse("stop"), Some(PlayInput::Stop));
        assert_eq!(PlayInput::parse("seek 0:45"), Some(PlayInput::Seek(45.0)));
        assert_eq!(
            PlayInput::parse("rewind"),
            Some(PlayInput::Invalid("rewind".into()))
        );
    }
}

// =============================================================================
// JSON Output
// =============================================================================

mod output {
    use super::*;

    #[test]
    fn test_catalog_tree_json() {
        let catalog = parse_catalog(CATALOG).unwrap();
        let root = catalog.tree.root();
        let items: Vec<CatalogNode> = root
            .children()
            .into_iter()
            .map(|child| CatalogNode::from_item(child, None))
            .collect();

        let value = serde_json::to_value(&items).unwrap();
        assert_eq!(
            value,
            json!([{
                "title": "Shorts",
                "children": [{
                    "title": "Clip A",
                    "image": "https://host/img/a.jpg",
                    "url": "https://host/mp4/a.mp4"
                }]
            }])
        );
    }

    #[test]
    fn test_catalog_tree_depth_limit() {
        let catalog = parse_catalog(CATALOG).unwrap();
        let group = catalog.tree.root().children()[0];
        let node = CatalogNode::from_item(group, Some(1));
        assert_eq!(node.title, "Shorts");
        assert!(node.children.is_empty());
    }

    #[test]
    fn test_error_output_shape() {
        let output = JsonOutput::<()>::error_msg("Device not found: Attic", ExitCode::DeviceNotFound);
        let value = serde_json::to_value(&output).unwrap();
        assert_eq!(
            value,
            json!({"error": "Device not found: Attic", "exit_code": 4})
        );
    }

    #[test]
    fn test_success_output_omits_exit_code() {
        let value = serde_json::to_value(JsonOutput::success(json!({"ok": true}))).unwrap();
        assert_eq!(value, json!({"data": {"ok": true}}));
    }
}

// =============================================================================
// catt Output Parsing
// =============================================================================

mod catt {
    use super::*;

    #[test]
    fn test_scan_output() {
        let devices = CastDevice::parse_catt_scan(
            "Scanning Chromecasts...\n192.168.1.20 - Kitchen speaker - Google Inc. Google Home\n",
        );
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].name, "Kitchen speaker");
    }

    #[test]
    fn test_status_output() {
        let status = parse_catt_status("Title: Clip A\nTime: 2:05 / 9:56 (21%)\nState: PAUSED\n");
        assert_eq!(status.state, RemotePlayerState::Paused);
        assert_eq!(status.position, Duration::from_secs(125));
        assert_eq!(status.duration, Some(Duration::from_secs(596)));
        assert_eq!(status.title.as_deref(), Some("Clip A"));
    }

    #[test]
    fn test_status_without_session() {
        let status = parse_catt_status("Nothing is currently playing");
        assert_eq!(status.state, RemotePlayerState::Idle);
        assert!(status.duration.is_none());
    }
}
