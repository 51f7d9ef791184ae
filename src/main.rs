#[cfg(not(target_arch = "wasm32"))]
fn main() -> anyhow::Result<()> {
    let config = mdl_viewer::config::ViewerConfig::from_env()?;
    mdl_viewer::flow::run(config)
}

// The browser build starts through the exported `start` function.
#[cfg(target_arch = "wasm32")]
fn main() {}
