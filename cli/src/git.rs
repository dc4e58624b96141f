use crate::error::Error;
use std::process::Command;

/// Commit and push the working tree to trigger the pipeline's first run
///
/// A clean tree is pushed as-is, only dirty trees get a commit.
pub fn push_trigger(branch: &str) -> eyre::Result<()> {
    let status = run(&["status", "--porcelain"])?;

    if status.trim().is_empty() {
        log::debug!("Working tree is clean, pushing without a commit");
    } else {
        run(&["add", "-A"])?;

        let message = format!(
            "Bootstrap pipeline ({})",
            chrono::Utc::now().format("%Y-%m-%d %H:%M UTC"),
        );

        run(&["commit", "-m", &message])?;
    }

    run(&["push", "origin", branch])?;

    println!(
        "{} {}",
        console::style("Pushed to").green().bold(),
        console::style(branch).bold(),
    );

    Ok(())
}

fn run(args: &[&str]) -> eyre::Result<String> {
    match Command::new("git").args(args).output() {
        Ok(output) if output.status.success() => {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        }
        Ok(output) => Err(Error::new(
            &format!("git {} failed", args.join(" ")),
            Some(String::from_utf8_lossy(&output.stderr).trim()),
        )
        .into()),
        Err(err) => Err(Error::new(
            "Failed to run git",
            Some(&format!("Is git installed? ({err})")),
        )
        .into()),
    }
}
