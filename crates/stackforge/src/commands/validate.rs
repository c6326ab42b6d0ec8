use colored::Colorize;
use std::path::Path;

pub fn handle(config: Option<&Path>) -> anyhow::Result<()> {
    println!("{}", "Validating stack...".blue());

    let stack = super::load_stack(config)?;
    if !super::is_valid_stack_name(&stack.name) {
        anyhow::bail!("Invalid stack name: {}", stack.name);
    }
    let document = stack.blueprint.build()?;

    println!("{}", "✓ Stack file is valid".green().bold());
    println!();
    println!("Summary:");
    println!("  Stack: {}", stack.name.cyan());
    println!("  Region: {}", stack.region.as_deref().unwrap_or("(environment)"));
    println!("  Features: {}", stack.blueprint.features().join(", "));
    println!("  Parameters: {}", document.parameters().len());
    println!("  Resources: {}", document.resources().len());
    println!("  Outputs: {}", document.outputs().len());

    let required = document.required_capabilities();
    if !required.is_empty() {
        let names: Vec<&str> = required.iter().map(|c| c.as_str()).collect();
        println!("  Required capabilities: {}", names.join(", "));
        let missing: Vec<&str> = required
            .iter()
            .filter(|req| !stack.capabilities.iter().any(|c| c.covers(**req)))
            .map(|c| c.as_str())
            .collect();
        if !missing.is_empty() {
            println!(
                "  {} not acknowledged: {} (add to stack.capabilities or pass --capability-iam)",
                "⚠".yellow(),
                missing.join(", ")
            );
        }
    }
    Ok(())
}
