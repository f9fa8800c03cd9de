//! AlphaForge - CLI entry point.
//!
//! Binary target for the polish/expand/simulate commands.

fn main() -> anyhow::Result<()> {
    alphaforge::run()
}
