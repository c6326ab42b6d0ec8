use colored::Colorize;
use stackforge_cloud_aws::CloudFormationSubmitter;
use stackforge_template::{Capability, CreateStackRequest, SubmitError, submit};
use std::path::Path;

pub struct DeployOptions {
    pub region: Option<String>,
    pub stack_name: Option<String>,
    pub capability_iam: bool,
    pub yes: bool,
}

pub async fn handle(config: Option<&Path>, options: DeployOptions) -> anyhow::Result<()> {
    let stack = super::load_stack(config)?;
    let stack_name = options.stack_name.unwrap_or_else(|| stack.name.clone());
    if !super::is_valid_stack_name(&stack_name) {
        anyhow::bail!("Invalid stack name: {}", stack_name);
    }
    let region = options.region.or_else(|| stack.region.clone());

    let mut capabilities = stack.capabilities.clone();
    if options.capability_iam && !capabilities.contains(&Capability::Iam) {
        capabilities.push(Capability::Iam);
    }

    let document = stack.blueprint.build()?;
    let request = CreateStackRequest::new(&stack_name, &document, stack.format, capabilities)?;

    println!("{}", "Deployment".bold());
    println!("  Stack: {}", stack_name.cyan());
    println!("  Region: {}", region.as_deref().unwrap_or("(environment)"));
    println!("  Resources: {}", document.resources().len());
    println!(
        "  Template: {} bytes ({})",
        request.template_body.len(),
        stack.format
    );
    if !request.capabilities.is_empty() {
        let names: Vec<&str> = request.capabilities.iter().map(Capability::as_str).collect();
        println!("  Capabilities: {}", names.join(", "));
    }
    let missing = request.missing_capabilities();
    if !missing.is_empty() {
        let names: Vec<&str> = missing.iter().map(Capability::as_str).collect();
        println!(
            "  {} capabilities not acknowledged: {}",
            "⚠".yellow(),
            names.join(", ")
        );
    }

    if !options.yes {
        println!();
        println!("Dry run. Pass {} to submit.", "--yes".cyan());
        return Ok(());
    }

    let submitter = CloudFormationSubmitter::from_env(region).await;
    match submit(&submitter, &request).await {
        Ok(receipt) => {
            println!();
            println!("{}", "✓ Stack creation initiated".green().bold());
            if let Some(stack_id) = receipt.stack_id {
                println!("  Stack ID: {}", stack_id.cyan());
            }
            Ok(())
        }
        Err(err @ SubmitError::Rejected { .. }) => {
            eprintln!();
            eprintln!("{}", "✗ Rejected by CloudFormation".red().bold());
            Err(err.into())
        }
        Err(err) => Err(err.into()),
    }
}
