//! Check command.

use console::style;

use crate::browser::find_chrome;
use crate::config::Config;
use crate::extract::TextExtractor;

/// Report which optional tools and services are available.
pub fn cmd_check(config: &Config) -> anyhow::Result<()> {
    println!("\n{}", style("Tool Status").bold());
    println!("{}", "-".repeat(50));

    println!("\n{}", style("Browser:").cyan());
    let browser_status = if let Some(ref remote) = config.browser.remote_url {
        style(format!("✓ remote {}", remote)).green()
    } else if let Some(ref path) = config.browser.chrome_path {
        if path.exists() {
            style(format!("✓ {}", path.display())).green()
        } else {
            style(format!("✗ {} missing", path.display())).red()
        }
    } else {
        match find_chrome() {
            Some(path) => style(format!("✓ {}", path.display())).green(),
            None => style("✗ not found".to_string()).red(),
        }
    };
    println!("  {:<15} {}", "chrome", browser_status);
    if cfg!(not(feature = "browser")) {
        println!(
            "                  {}",
            style("browser support not compiled; rebuild with --features browser").dim()
        );
    }

    println!("\n{}", style("Extraction Tools:").cyan());
    let mut all_found = true;
    for (tool, available) in TextExtractor::check_tools() {
        let status = if available {
            style("✓ found").green()
        } else {
            all_found = false;
            style("✗ not found").red()
        };
        println!("  {:<15} {}", tool, status);
    }

    println!("\n{}", style("Challenge Solver:").cyan());
    let solver_status = if config.solver.is_configured() {
        style("✓ configured").green()
    } else {
        style("○ no API key (set CAPTCHA_API_KEY)").yellow()
    };
    println!("  {:<15} {}", "service", solver_status);

    if !all_found {
        println!(
            "\n{}",
            style("Missing tools degrade extraction for legacy .doc and damaged PDFs.").dim()
        );
    }
    println!();

    Ok(())
}
