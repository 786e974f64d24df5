pub mod snapshot_preview;
