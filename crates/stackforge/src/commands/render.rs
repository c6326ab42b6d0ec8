use anyhow::Context;
use colored::Colorize;
use stackforge_template::Format;
use std::io::Write;
use std::path::Path;

pub fn handle(config: Option<&Path>, output: Option<&Path>, format: Option<Format>) -> anyhow::Result<()> {
    let stack = super::load_stack(config)?;
    let document = stack.blueprint.build()?;
    let format = format.unwrap_or(stack.format);
    let body = document.to_string(format)?;

    match output {
        Some(path) => {
            std::fs::write(path, &body)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!(
                "{} {} resources rendered to {} ({})",
                "✓".green().bold(),
                document.resources().len(),
                path.display().to_string().cyan(),
                format
            );
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(body.as_bytes())?;
            stdout.flush()?;
        }
    }
    Ok(())
}
