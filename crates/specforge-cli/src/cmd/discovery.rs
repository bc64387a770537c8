use crate::output::{or_dash, print_fields, print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use specforge_core::controller::DiscoveryController;
use specforge_core::discovery::{Discovery, DiscoverySummary, DiscoveryUpdate, NewFeature, NewUser};
use specforge_core::types::Stage;
use std::path::Path;

use super::GenerationArgs;

#[derive(Subcommand)]
pub enum DiscoverySubcommand {
    /// Show the project's discovery, creating it if needed
    Show { project: String },

    /// Advance one stage
    Advance { project: String },

    /// Set free-form discovery fields
    Set {
        project: String,
        #[arg(long)]
        business_context: Option<String>,
        #[arg(long)]
        problem: Option<String>,
        /// Replace the goal list (repeatable: --goal a --goal b)
        #[arg(long = "goal")]
        goals: Vec<String>,
        /// Project name shown in the summary
        #[arg(long)]
        name: Option<String>,
        /// One-line statement of what the project solves
        #[arg(long)]
        solves: Option<String>,
    },

    /// Add a user persona
    AddUser {
        project: String,
        description: String,
        /// Approximate number of such users
        #[arg(long, default_value = "0")]
        count: u32,
        /// Persona needs elevated permissions
        #[arg(long)]
        permissions: bool,
        #[arg(long)]
        notes: Option<String>,
    },

    /// Add a feature (v1 = MVP)
    #[command(disable_version_flag = true)]
    AddFeature {
        project: String,
        name: String,
        /// Lower is more important
        #[arg(long, default_value = "0")]
        priority: i32,
        #[arg(long)]
        version: Option<String>,
    },

    /// Confirm the summary and seed PRDs for MVP features
    Confirm { project: String },

    /// Discard the discovery and start over
    Reset { project: String },

    /// Show the summary (users, MVP and future features)
    Summary { project: String },

    /// Show field edit history, newest first
    History { project: String },
}

pub fn run(
    root: &Path,
    subcmd: DiscoverySubcommand,
    gen: &GenerationArgs,
    json: bool,
) -> anyhow::Result<()> {
    let controllers = super::open(root, gen)?;
    let ctl = controllers.discovery.as_ref();

    match subcmd {
        DiscoverySubcommand::Show { project } => {
            let d = ctl.get_or_create(&project)?;
            show(ctl, &d, json)
        }
        DiscoverySubcommand::Advance { project } => {
            let id = find(ctl, &project)?;
            let d = ctl.advance_stage(&id)?;
            if json {
                return print_json(&d.view());
            }
            println!("Advanced to {}.", stage_label(d.stage));
            Ok(())
        }
        DiscoverySubcommand::Set {
            project,
            business_context,
            problem,
            goals,
            name,
            solves,
        } => {
            let update = DiscoveryUpdate {
                business_context,
                problem_statement: problem,
                goals: (!goals.is_empty()).then_some(goals),
                project_name: name,
                solves_statement: solves,
                ..Default::default()
            };
            if update.is_empty() {
                anyhow::bail!("nothing to update: pass at least one field");
            }
            let id = find(ctl, &project)?;
            let d = ctl.update_data(&id, &update)?;
            show(ctl, &d, json)
        }
        DiscoverySubcommand::AddUser {
            project,
            description,
            count,
            permissions,
            notes,
        } => {
            let id = find(ctl, &project)?;
            let user = ctl.add_user(
                &id,
                NewUser {
                    description,
                    user_count: count,
                    has_permissions: permissions,
                    permission_notes: notes,
                },
            )?;
            if json {
                return print_json(&user);
            }
            println!("Added user: {} ({})", user.description, user.id);
            Ok(())
        }
        DiscoverySubcommand::AddFeature {
            project,
            name,
            priority,
            version,
        } => {
            let id = find(ctl, &project)?;
            let feature = ctl.add_feature(
                &id,
                NewFeature {
                    name,
                    priority,
                    version,
                },
            )?;
            if json {
                return print_json(&feature);
            }
            println!(
                "Added feature: {} [{} P{}] ({})",
                feature.name, feature.version, feature.priority, feature.id
            );
            Ok(())
        }
        DiscoverySubcommand::Confirm { project } => {
            let id = find(ctl, &project)?;
            let confirmation = ctl.confirm(&id)?;
            if json {
                return print_json(&confirmation);
            }
            println!("Discovery confirmed.");
            println!("Seeded {} PRD(s):", confirmation.seeded.len());
            for prd in &confirmation.seeded {
                println!("  {}  {}", prd.id, prd.title);
            }
            Ok(())
        }
        DiscoverySubcommand::Reset { project } => {
            let id = find(ctl, &project)?;
            let d = ctl.reset(&id)?;
            if json {
                return print_json(&d.view());
            }
            println!("Discovery reset. New discovery: {}", d.id);
            Ok(())
        }
        DiscoverySubcommand::Summary { project } => {
            let id = find(ctl, &project)?;
            let summary = ctl.summary(&id)?;
            if json {
                return print_json(&summary);
            }
            print_summary(&summary);
            Ok(())
        }
        DiscoverySubcommand::History { project } => {
            let id = find(ctl, &project)?;
            let entries = ctl.history(&id)?;
            if json {
                return print_json(&entries);
            }
            if entries.is_empty() {
                println!("No edits recorded.");
                return Ok(());
            }
            let rows = entries
                .iter()
                .map(|e| {
                    vec![
                        e.edited_at.format("%Y-%m-%d %H:%M").to_string(),
                        e.stage.to_string(),
                        e.field_edited.clone(),
                        e.original_value.clone(),
                        e.new_value.clone(),
                    ]
                })
                .collect();
            print_table(&["WHEN", "STAGE", "FIELD", "FROM", "TO"], rows);
            Ok(())
        }
    }
}

fn find(ctl: &DiscoveryController, project: &str) -> anyhow::Result<String> {
    let d = ctl.find_for_project(project).with_context(|| {
        format!("no discovery for project '{project}'; run `specforge discovery show {project}`")
    })?;
    Ok(d.id)
}

fn stage_label(stage: Stage) -> String {
    if stage.is_complete() {
        return stage.to_string();
    }
    format!("{stage} ({} of {})", stage.number(), Stage::visible_count())
}

fn show(ctl: &DiscoveryController, d: &Discovery, json: bool) -> anyhow::Result<()> {
    let summary = match d.stage {
        Stage::Summary | Stage::Complete => Some(ctl.summary(&d.id)?),
        _ => None,
    };
    if json {
        return print_json(&serde_json::json!({
            "discovery": d.view(),
            "summary": summary,
        }));
    }

    print_fields(&[
        ("discovery", d.id.clone()),
        ("project", d.project_id.clone()),
        ("stage", stage_label(d.stage)),
        ("project name", or_dash(d.project_name.as_deref())),
        ("business context", or_dash(d.business_context.as_deref())),
        ("problem", or_dash(d.problem_statement.as_deref())),
        ("solves", or_dash(d.solves_statement.as_deref())),
        (
            "goals",
            if d.goals.is_empty() {
                "-".to_string()
            } else {
                d.goals.join("; ")
            },
        ),
    ]);
    if let Some(summary) = summary {
        println!();
        print_summary(&summary);
    }
    Ok(())
}

fn print_summary(summary: &DiscoverySummary) {
    println!("Users:");
    let rows = summary
        .users
        .iter()
        .map(|u| {
            vec![
                u.description.clone(),
                u.user_count.to_string(),
                if u.has_permissions { "yes" } else { "no" }.to_string(),
            ]
        })
        .collect();
    print_table(&["DESCRIPTION", "COUNT", "ELEVATED"], rows);

    for (title, features) in [
        ("MVP features:", &summary.mvp_features),
        ("Future features:", &summary.future_features),
    ] {
        println!("\n{title}");
        let rows = features
            .iter()
            .map(|f| vec![f.priority.to_string(), f.name.clone(), f.version.clone()])
            .collect();
        print_table(&["PRIORITY", "NAME", "VERSION"], rows);
    }
}
