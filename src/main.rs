//! Vote Sync Entry Point

#[cfg(target_arch = "wasm32")]
fn main() {
    vote_sync_ui::start();
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    eprintln!("vote-sync-ui runs in the browser; build it for wasm32-unknown-unknown");
}
