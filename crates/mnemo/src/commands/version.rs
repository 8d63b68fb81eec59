pub fn run() -> anyhow::Result<()> {
    println!("mnemo {}", env!("CARGO_PKG_VERSION"));
    println!("Tool-result memory for long-running agents");
    Ok(())
}
