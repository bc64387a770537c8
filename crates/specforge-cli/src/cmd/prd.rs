use crate::output::{or_dash, print_fields, print_json, print_table};
use clap::Subcommand;
use specforge_core::prd::{Prd, PrdList};
use specforge_core::types::PrdStatus;
use std::path::Path;

use super::GenerationArgs;

#[derive(Subcommand)]
pub enum PrdSubcommand {
    /// List a project's PRDs by version and priority
    List {
        project: String,
        /// Only MVP (v1) PRDs
        #[arg(long)]
        mvp: bool,
    },

    /// Show one PRD with its content
    Show { id: String },

    /// Set status: ready, in_progress or complete
    Status { id: String, status: String },

    /// Retry generation of a pending PRD
    Retry { id: String },

    /// Generate every pending PRD of a project that has attempts left
    Generate { project: String },

    /// Show the project's in-progress PRD
    Active { project: String },

    /// Start implementing a ready PRD
    Activate { project: String, prd: String },

    /// Pause the active PRD back to ready
    Clear { project: String },

    /// Show the next ready PRD by priority
    Next { project: String },
}

pub fn run(
    root: &Path,
    subcmd: PrdSubcommand,
    gen: &GenerationArgs,
    json: bool,
) -> anyhow::Result<()> {
    let controllers = super::open(root, gen)?;
    let ctl = controllers.prds.as_ref();

    match subcmd {
        PrdSubcommand::List { project, mvp } => {
            let prds = if mvp {
                ctl.list_mvp(&project)?
            } else {
                ctl.list(&project)?
            };
            list(&prds, json)
        }
        PrdSubcommand::Show { id } => show(&ctl.get(&id)?, json),
        PrdSubcommand::Status { id, status } => {
            let target: PrdStatus = status.parse()?;
            let prd = ctl.update_status(&id, target)?;
            report(&prd, json, &format!("{} is now {}.", prd.id, prd.status))
        }
        PrdSubcommand::Retry { id } => {
            let prd = ctl.retry_generation(&id)?;
            report_generation(&prd, json)
        }
        PrdSubcommand::Generate { project } => {
            let prds = ctl.generate_pending(&project)?;
            if json {
                let views: Vec<_> = prds.iter().map(Prd::view).collect();
                return print_json(&views);
            }
            if prds.is_empty() {
                println!("No pending PRDs with attempts left.");
            }
            for prd in &prds {
                report_generation(prd, false)?;
            }
            Ok(())
        }
        PrdSubcommand::Active { project } => show(&ctl.get_active(&project)?, json),
        PrdSubcommand::Activate { project, prd } => {
            let prd = ctl.set_active_prd(&project, &prd)?;
            report(&prd, json, &format!("Active PRD: {} ({})", prd.title, prd.id))
        }
        PrdSubcommand::Clear { project } => match ctl.clear_active_prd(&project)? {
            Some(prd) => report(&prd, json, &format!("Cleared active PRD {}.", prd.id)),
            None if json => print_json(&serde_json::Value::Null),
            None => {
                println!("No active PRD.");
                Ok(())
            }
        },
        PrdSubcommand::Next { project } => show(&ctl.next_prd(&project)?, json),
    }
}

fn report(prd: &Prd, json: bool, message: &str) -> anyhow::Result<()> {
    if json {
        return print_json(&prd.view());
    }
    println!("{message}");
    Ok(())
}

fn report_generation(prd: &Prd, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(&prd.view());
    }
    match prd.status {
        PrdStatus::Pending => println!(
            "{}: generation failed (attempt {}): {}",
            prd.title,
            prd.generation_attempts,
            or_dash(prd.last_error.as_deref())
        ),
        _ => println!("{}: {} ({})", prd.title, prd.status, prd.id),
    }
    Ok(())
}

fn list(prds: &[Prd], json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(&PrdList::from_prds(prds));
    }
    if prds.is_empty() {
        println!("No PRDs.");
        return Ok(());
    }
    let rows = prds
        .iter()
        .map(|p| {
            vec![
                p.id.clone(),
                p.version.clone(),
                p.priority.to_string(),
                p.status.to_string(),
                p.title.clone(),
            ]
        })
        .collect();
    print_table(&["ID", "VERSION", "PRIORITY", "STATUS", "TITLE"], rows);
    Ok(())
}

fn show(prd: &Prd, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(&prd.view());
    }
    let mvp = if prd.is_mvp() { " (MVP)" } else { "" };
    print_fields(&[
        ("id", prd.id.clone()),
        ("title", prd.title.clone()),
        ("status", prd.status.to_string()),
        ("version", format!("{}{mvp}", prd.version)),
        ("priority", prd.priority.to_string()),
        ("attempts", prd.generation_attempts.to_string()),
        ("last error", or_dash(prd.last_error.as_deref())),
        ("generated", stamp(prd.generated_at)),
        ("approved", stamp(prd.approved_at)),
        ("started", stamp(prd.started_at)),
        ("completed", stamp(prd.completed_at)),
    ]);
    if !prd.overview.is_empty() {
        println!("\n{}", prd.overview);
    }
    if !prd.user_stories.is_empty() {
        println!("\nUser stories:");
        for s in &prd.user_stories {
            println!("  {}  As a {}, I want {}, so that {}", s.id, s.as_a, s.i_want, s.so_that);
        }
    }
    if !prd.acceptance_criteria.is_empty() {
        println!("\nAcceptance criteria:");
        for c in &prd.acceptance_criteria {
            println!("  {}  Given {}, when {}, then {}", c.id, c.given, c.when, c.then);
        }
    }
    if !prd.technical_notes.is_empty() {
        println!("\nTechnical notes:");
        for n in &prd.technical_notes {
            println!("  [{}] {}: {}", n.category, n.title, n.description);
        }
    }
    Ok(())
}

fn stamp<T: std::fmt::Display>(t: Option<T>) -> String {
    t.map(|t| t.to_string()).unwrap_or_else(|| "-".to_string())
}
