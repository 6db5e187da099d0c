//! `siscodex`: command-line front end for the SIS-CodEx group engine.
//!
//! # Usage
//!
//! ```
//! siscodex --url https://codex.example/api --token … tree --term 2024-1
//! siscodex --config ~/.config/siscodex.toml plant --year 2024 --term 2
//! ```

use std::{
  io::{self, BufRead, Write},
  path::PathBuf,
};

use anyhow::{Context as _, bail};
use clap::{Parser, Subcommand};
use siscodex_batch::{BatchConfig, BatchOrchestrator, BatchReport};
use siscodex_client::{ClientConfig, HttpRepository};
use siscodex_core::{
  candidates::CandidateResolver,
  event::{Course, SchedulingEvent},
  group::{AttributeKey, Group, GroupId},
  index::{course_codes, index_by_event, term_keys},
  term::TermId,
  tree::{AugmentedGroup, GroupTreeBuilder, TreeNode},
};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(author, version, about = "SIS-CodEx group management")]
struct Cli {
  /// Path to a TOML config file (base_url, token, locale, timeout_secs,
  /// max_in_flight).
  #[arg(short, long, value_name = "FILE", default_value = "siscodex.toml")]
  config: PathBuf,

  /// Base URL of the CodEx API.
  #[arg(long, env = "SISCODEX_URL")]
  url: Option<String>,

  /// Bearer token.
  #[arg(long, env = "SISCODEX_TOKEN", hide_env_values = true)]
  token: Option<String>,

  /// Locale for group names (`cs` or `en`).
  #[arg(long, global = true)]
  locale: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Print the group tree, optionally filtered by attributes.
  Tree {
    #[arg(long)]
    course: Option<String>,
    #[arg(long)]
    term:   Option<String>,
  },
  /// Group count plus the distinct course codes and term keys in use.
  Summary,
  /// List groups bound to each SIS scheduling event.
  EventsIndex,
  /// Groups that may host (or be bound to) a scheduling event.
  Candidates {
    #[arg(long)]
    course:  String,
    #[arg(long)]
    year:    i32,
    #[arg(long)]
    term:    u8,
    #[arg(long)]
    sis_id:  String,
    /// Show binding candidates instead of parent candidates.
    #[arg(long)]
    binding: bool,
  },
  /// Create term groups under every course group missing one.
  Plant {
    #[arg(long)]
    year: i32,
    #[arg(long)]
    term: u8,
    /// Skip the confirmation prompt.
    #[arg(long)]
    yes:  bool,
  },
  /// Archive term groups whose term has ended.
  Archive {
    #[arg(long)]
    yes: bool,
  },
  /// Add an attribute value to a group.
  AddAttribute { group: String, key: String, value: String },
  /// Remove an attribute value from a group.
  RemoveAttribute { group: String, key: String, value: String },
  /// Bind a group to a SIS scheduling event.
  Bind { group: String, sis_id: String },
  /// Remove a group's binding to a SIS scheduling event.
  Unbind { group: String, sis_id: String },
  /// Join a group as a student.
  Join { group: String },
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(io::stderr)
    .init();

  let cli = Cli::parse();

  // CLI flags override environment, which overrides the config file.
  let mut config = ClientConfig::load(&cli.config)?;
  if let Some(url) = cli.url {
    config.base_url = url;
  }
  if let Some(token) = cli.token {
    config.token = Some(token);
  }
  if let Some(locale) = cli.locale {
    config.locale = locale;
  }

  let repo = HttpRepository::new(&config)?;
  let orchestrator = BatchOrchestrator::with_config(repo, BatchConfig {
    max_in_flight: config.max_in_flight,
  });
  let groups = orchestrator.reload().await.context("failed to load groups")?;
  let locale = config.locale.as_str();
  let builder = GroupTreeBuilder::default();

  match cli.command {
    Command::Tree { course, term } => {
      let filtered = course.is_some() || term.is_some();
      let matches = |g: &Group| {
        course
          .as_deref()
          .is_none_or(|c| g.attributes.contains(&AttributeKey::Course, c))
          && term
            .as_deref()
            .is_none_or(|t| g.attributes.contains(&AttributeKey::Term, t))
      };
      let filter = filtered.then_some(&matches as &dyn Fn(&Group) -> bool);
      for node in builder.top_level_groups(&groups, locale, filter)? {
        print_tree(&node, locale, 0);
      }
    }

    Command::Summary => {
      let join = |values: std::collections::BTreeSet<String>| {
        values.into_iter().collect::<Vec<_>>().join(", ")
      };
      println!("groups:  {}", groups.len());
      println!("courses: {}", join(course_codes(&groups)));
      println!("terms:   {}", join(term_keys(&groups)));
    }

    Command::EventsIndex => {
      let forest = builder.augment(&groups, locale)?;
      for (sis_id, bound) in index_by_event(&forest) {
        println!("{sis_id}");
        for group in bound {
          println!("  {}", describe(group));
        }
      }
    }

    Command::Candidates { course, year, term, sis_id, binding } => {
      let forest = builder.augment(&groups, locale)?;
      let resolver = CandidateResolver::new(&groups, &forest)?;
      let event = SchedulingEvent {
        id: String::new(),
        sis_id,
        course: Course { code: course, ..Course::default() },
        year: Some(year),
        term: Some(term),
        kind: None,
        day_of_week: None,
        time: None,
        room: None,
        fortnight: false,
        first_week: 0,
      };
      let candidates = if binding {
        resolver.binding_candidates(&event)
      } else {
        resolver.parent_candidates(&event)
      };
      if candidates.is_empty() {
        println!("no suitable groups");
      }
      for group in candidates {
        println!("{}", describe(group));
      }
    }

    Command::Plant { year, term, yes } => {
      let opened = orchestrator.open_plant(TermId::new(year, term)).await?;
      if opened.selection_count == 0 {
        println!("every course group already has a {year}-{term} group");
        return Ok(());
      }
      let texts = opened.plant_texts.unwrap_or_default();
      println!(
        "planting \"{}\" / \"{}\" under {} group(s):",
        texts.cs.name, texts.en.name, opened.selection_count
      );
      print_selection(opened.selection.keys());
      orchestrator.submit_plant_texts(texts).await?;

      if !yes && !confirm("create these groups?")? {
        orchestrator.cancel_plant().await?;
        return Ok(());
      }
      let report = orchestrator.execute_plant().await?;
      print_report(&report);
      if report.counts.failed > 0 {
        bail!("{} of the groups could not be created", report.counts.failed);
      }
    }

    Command::Archive { yes } => {
      let opened = orchestrator.start_archiving().await?;
      if opened.selection_count == 0 {
        println!("nothing to archive");
        return Ok(());
      }
      println!("archiving {} group(s):", opened.selection_count);
      print_selection(opened.selection.keys());

      if !yes && !confirm("archive these groups?")? {
        orchestrator.cancel_archiving().await?;
        return Ok(());
      }
      let report = orchestrator.execute_archive().await?;
      print_report(&report);
    }

    Command::AddAttribute { group, key, value } => {
      orchestrator.open_add_attribute(&GroupId::from(group.as_str())).await?;
      if let Err(err) = orchestrator.submit_add_attribute(AttributeKey::from(key), value).await {
        orchestrator.cancel_add_attribute().await.ok();
        return Err(err.into());
      }
      println!("added");
    }

    Command::RemoveAttribute { group, key, value } => {
      orchestrator
        .remove_attribute(&GroupId::from(group.as_str()), AttributeKey::from(key), value)
        .await?;
      println!("removed");
    }

    Command::Bind { group, sis_id } => {
      orchestrator.bind_group(&GroupId::from(group.as_str()), sis_id).await?;
      println!("bound");
    }

    Command::Unbind { group, sis_id } => {
      orchestrator.unbind_group(&GroupId::from(group.as_str()), sis_id).await?;
      println!("unbound");
    }

    Command::Join { group } => {
      orchestrator.join_group(&GroupId::from(group.as_str())).await?;
      println!("joined");
    }
  }

  Ok(())
}

// ─── Output ───────────────────────────────────────────────────────────────────

fn describe(group: &AugmentedGroup) -> String {
  let admin = if group.is_admin { " [admin]" } else { "" };
  format!("{} ({}){admin}", group.full_name, group.id())
}

fn print_tree(node: &TreeNode, locale: &str, indent: usize) {
  let group = &node.group;
  let attrs: Vec<String> = group
    .group
    .attributes
    .iter()
    .flat_map(|(key, values)| values.iter().map(move |v| format!("{}={v}", key.as_str())))
    .collect();
  let name = group.group.name.resolve(locale);
  if attrs.is_empty() {
    println!("{:indent$}{name} ({})", "", group.id(), indent = indent * 2);
  } else {
    println!(
      "{:indent$}{name} ({}) {}",
      "",
      group.id(),
      attrs.join(" "),
      indent = indent * 2
    );
  }
  for child in &node.children {
    print_tree(child, locale, indent + 1);
  }
}

fn print_selection<'a>(ids: impl Iterator<Item = &'a GroupId>) {
  for id in ids {
    println!("  {id}");
  }
}

fn print_report(report: &BatchReport) {
  println!("{} succeeded, {} failed", report.counts.succeeded, report.counts.failed);
  for (id, error) in &report.errors {
    println!("  {id}: {error}");
  }
}

/// Ask a yes/no question on stdin; anything but `y`/`yes` is a no.
fn confirm(question: &str) -> anyhow::Result<bool> {
  print!("{question} [y/N] ");
  io::stdout().flush().ok();
  let mut line = String::new();
  io::stdin().lock().read_line(&mut line).context("reading answer")?;
  Ok(matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}
