mod cli;
mod config;
mod database;
mod editor;
mod logging;
mod models;
mod persistence;
mod store;
mod ui;
mod view;

use anyhow::{bail, Result};
use clap::Parser;
use cli::{Cli, Commands};
use config::Settings;
use database::Database;
use models::{Priority, Task};
use persistence::{KeyValueStore, TASKS_SLOT};
use store::{Action, TaskStore};
use ui::run_tui;
use uuid::Uuid;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Completions touch neither the log file nor the database.
    if let Some(Commands::Completions { shell }) = &cli.command {
        if !cli::write_completions(shell, &mut std::io::stdout()) {
            println!("Unsupported shell: {}", shell);
        }
        return Ok(());
    }

    if let Err(e) = logging::init(&logging::default_log_path()) {
        eprintln!("Warning: logging disabled: {e:#}");
    }

    let db_path = cli.db.clone().unwrap_or_else(database::default_db_path);
    let mut db = Database::open(&db_path)?;
    let settings = Settings::load(&db);

    match &cli.command {
        Some(Commands::Set { key, value }) => {
            config::validate(key, value)?;
            db.set_config(key, value, config::describe(key))?;
            println!("Config '{}' set to '{}'", key, value);
            return Ok(());
        }
        Some(Commands::Get { key }) => {
            match db.get_config(key)? {
                Some(value) => println!("{}", value),
                None => println!("Config '{}' not set", key),
            }
            return Ok(());
        }
        Some(Commands::ConfigList) => {
            let configs = db.get_all_configs()?;
            if configs.is_empty() {
                println!("No config values set.");
            }
            for item in configs {
                match item.description {
                    Some(description) => println!(
                        "{} = {}  ({}, updated {})",
                        item.key_name, item.value, description, item.updated_at
                    ),
                    None => println!("{} = {}  (updated {})", item.key_name, item.value, item.updated_at),
                }
            }
            return Ok(());
        }
        Some(Commands::ConfigDelete { key }) => {
            if db.delete_config(key)? {
                println!("Config '{}' deleted", key);
            } else {
                println!("Config '{}' not set", key);
            }
            return Ok(());
        }
        Some(Commands::Reset) => {
            db.remove(TASKS_SLOT)?;
            println!("All tasks deleted.");
            return Ok(());
        }
        _ => {}
    }

    let mut store =
        TaskStore::open(db)?.with_defaults(settings.default_filter, settings.default_priority);

    match cli.command {
        Some(Commands::Add { text, due, priority }) => {
            let before = store.tasks().len();
            fill_form(&mut store, text, due, priority.unwrap_or(settings.default_priority))?;
            // Blank text is dropped by the store without a message.
            store.dispatch(Action::Submit)?;
            if store.tasks().len() > before {
                println!("Added task {}", store.tasks().len());
            }
        }
        Some(Commands::List { filter, search }) => {
            store.dispatch(Action::SetFilter(filter.unwrap_or(settings.default_filter)))?;
            store.dispatch(Action::SetSearch(search.unwrap_or_default()))?;
            print_tasks(&store, &store.visible());
            println!("{} tasks left", store.active_count());
        }
        Some(Commands::Toggle { number }) => {
            let id = resolve_number(&store, number)?;
            store.dispatch(Action::Toggle(id))?;
            if let Some(task) = store.get(id) {
                let state = if task.completed { "completed" } else { "active" };
                println!("'{}' is now {}", task.text, state);
            }
        }
        Some(Commands::Edit { number, text, due, priority }) => {
            let id = resolve_number(&store, number)?;
            store.dispatch(Action::BeginEdit(id))?;
            let priority = priority.unwrap_or(store.form().priority);
            let due = due.or_else(|| Some(store.form().due_date.clone()));
            fill_form(&mut store, text, due, priority)?;
            store.dispatch(Action::Submit)?;
            if !store.is_editing() {
                println!("Updated task {}", number);
            }
        }
        Some(Commands::Delete { number }) => {
            let id = resolve_number(&store, number)?;
            let text = store.get(id).map(|t| t.text.clone()).unwrap_or_default();
            store.dispatch(Action::Delete(id))?;
            println!("Deleted '{}'", text);
        }
        Some(Commands::ClearCompleted) => {
            let before = store.tasks().len();
            store.dispatch(Action::ClearCompleted)?;
            println!("Removed {} completed tasks", before - store.tasks().len());
        }
        Some(Commands::Tui) | None => {
            run_tui(store)?;
        }
        Some(_) => {}
    }

    Ok(())
}

fn fill_form(
    store: &mut TaskStore<Database>,
    text: String,
    due: Option<String>,
    priority: Priority,
) -> Result<()> {
    let due = due.unwrap_or_default();
    if !due.trim().is_empty() && view::parse_due_date(&due).is_none() {
        bail!("Due date '{}' is not in YYYY-MM-DD format", due);
    }
    store.dispatch(Action::SetText(text))?;
    store.dispatch(Action::SetDueDate(due))?;
    store.dispatch(Action::SetPriority(priority))?;
    Ok(())
}

fn resolve_number(store: &TaskStore<Database>, number: usize) -> Result<Uuid> {
    match view::task_at_position(store.tasks(), number) {
        Some(task) => Ok(task.id),
        None => bail!("No task number {} (there are {})", number, store.tasks().len()),
    }
}

fn print_tasks(store: &TaskStore<Database>, rows: &[&Task]) {
    if rows.is_empty() {
        println!("No tasks.");
        return;
    }
    for task in rows {
        let number = view::position_of(store.tasks(), task.id).unwrap_or(0);
        let mark = if task.completed { "x" } else { " " };
        let mut line = format!("{:>3}. [{}] {}", number, mark, task.text);
        if let Some(due) = &task.due_date {
            line.push_str(&format!("  due {}", due));
        }
        if let Some(priority) = task.priority {
            line.push_str(&format!("  [{}]", priority));
        }
        println!("{}", line);
    }
}
