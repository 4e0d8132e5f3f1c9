use std::sync::Arc;

use chrono::NaiveDate;
use uuid::Uuid;

use daybook::config::DaybookConfig;
use daybook::core::dates;
use daybook::core::task::Task;
use daybook::store::jobs::JobList;
use daybook::store::keyed::{FileStorage, Storage};
use daybook::store::notes::NotesStore;
use daybook::store::tasks::TaskStore;
use daybook::sync::gist::{GistClient, RemoteState};
use daybook::sync::{self, ConnectOutcome, PushOutcome};

const USAGE: &str = "\
Usage: daybook <command>

  jobs                              list configured jobs
  jobs add <name>                   add a job
  jobs rm <name>                    remove a job (its data stays on disk)
  note <job> [date]                 show a day's note (default: today)
  note set <job> <date> <text...>   write a note (whitespace-only clears)
  note prev <job> <date>            jump to the previous day with a note
  note next <job> <date>            jump to the next day with a note, or today
  tasks <job> [--pending|--done]    list tasks
  task add <job> <title> [-d <text>] [--deadline <date>]
  task toggle <job> <id>            flip completion
  task rm <job> <id>                delete a task
  sync status                       show connection state
  sync connect <token>              store a GitHub token, probe, pull if bound
  sync bind <gist-id>               link an existing gist
  sync push                         upload the full snapshot
  sync pull                         overwrite local state from the remote
  sync disconnect                   forget the token and gist binding
";

#[tokio::main]
async fn main() {
    systemd_journal_logger::JournalLog::new()
        .unwrap()
        .with_syslog_identifier("daybook".to_string())
        .install()
        .unwrap();
    log::set_max_level(log::LevelFilter::Info);

    let config = DaybookConfig::load();
    if let Err(e) = config.ensure_dirs() {
        eprintln!("Failed to create {}: {}", config.data_dir.display(), e);
        std::process::exit(1);
    }

    let storage: Arc<dyn Storage> = Arc::new(FileStorage::new(&config.data_dir));
    let jobs = JobList::new(Arc::clone(&storage));
    let notes = NotesStore::new(Arc::clone(&storage));
    let tasks = TaskStore::new(Arc::clone(&storage));

    let args: Vec<String> = std::env::args().skip(1).collect();
    let argv: Vec<&str> = args.iter().map(String::as_str).collect();

    match argv.as_slice() {
        ["jobs"] => {
            for job in jobs.jobs() {
                println!("{job}");
            }
        }
        ["jobs", "add", name] => {
            if jobs.add(name) {
                println!("Added job {name}");
            } else {
                eprintln!("{name:?} is not a valid job name or already exists");
                std::process::exit(1);
            }
        }
        ["jobs", "rm", name] => jobs.remove(name),
        ["note", "set", job, date, text @ ..] => {
            notes.set_note(job, parse_date_arg(date), &text.join(" "));
        }
        ["note", "prev", job, date] => {
            match notes.find_previous_with_content(job, parse_date_arg(date)) {
                Some(found) => println!("{}", dates::to_iso(found)),
                None => {
                    eprintln!("No earlier note");
                    std::process::exit(1);
                }
            }
        }
        ["note", "next", job, date] => {
            match notes.find_next_with_rule(job, parse_date_arg(date), dates::today()) {
                Some(found) => println!("{}", dates::to_iso(found)),
                None => {
                    eprintln!("No later note");
                    std::process::exit(1);
                }
            }
        }
        ["note", job] => show_note(&notes, job, dates::today()),
        ["note", job, date] => show_note(&notes, job, parse_date_arg(date)),
        ["tasks", job] => print_tasks(&tasks.get_tasks(job)),
        ["tasks", job, "--pending"] => print_tasks(&tasks.get_pending_tasks(job)),
        ["tasks", job, "--done"] => print_tasks(&tasks.get_completed_tasks(job)),
        ["task", "add", job, title, rest @ ..] => add_task(&tasks, job, title, rest),
        ["task", "toggle", job, id] => tasks.toggle_task(job, parse_id_arg(id)),
        ["task", "rm", job, id] => tasks.delete_task(job, parse_id_arg(id)),
        ["sync", rest @ ..] => run_sync(rest, storage, &jobs, &notes, &tasks).await,
        _ => {
            eprint!("{USAGE}");
            std::process::exit(2);
        }
    }
}

fn parse_date_arg(s: &str) -> NaiveDate {
    match dates::parse_iso(s) {
        Some(date) => date,
        None => {
            eprintln!("Invalid date {s:?} (expected YYYY-MM-DD)");
            std::process::exit(2);
        }
    }
}

fn parse_id_arg(s: &str) -> Uuid {
    match Uuid::parse_str(s) {
        Ok(id) => id,
        Err(_) => {
            eprintln!("Invalid task id {s:?}");
            std::process::exit(2);
        }
    }
}

fn show_note(notes: &NotesStore, job: &str, date: NaiveDate) {
    println!("{}", dates::human_date(date));
    match notes.get_note(job, date) {
        Some(text) => println!("{text}"),
        None => println!("(no note)"),
    }
}

fn print_tasks(tasks: &[Task]) {
    let today = dates::today();
    for task in tasks {
        let mark = if task.completed { "x" } else { " " };
        let mut line = format!("[{mark}] {}  {}", task.id, task.title);
        if let Some(deadline) = task.deadline {
            line.push_str(&format!(" (due {})", dates::to_iso(deadline)));
            if task.is_overdue(today) {
                line.push_str(" OVERDUE");
            }
        }
        println!("{line}");
        if !task.description.is_empty() {
            println!("      {}", task.description);
        }
    }
}

fn add_task(tasks: &TaskStore, job: &str, title: &str, rest: &[&str]) {
    let mut description = String::new();
    let mut deadline = None;
    let mut iter = rest.iter().copied();
    while let Some(arg) = iter.next() {
        match arg {
            "-d" => description = iter.next().unwrap_or_default().to_string(),
            "--deadline" => deadline = iter.next().map(parse_date_arg),
            other => {
                eprintln!("Unknown option {other:?}");
                std::process::exit(2);
            }
        }
    }
    match tasks.add_task(job, title, &description, deadline) {
        Some(task) => println!("Added task {}", task.id),
        None => {
            eprintln!("Task title must not be empty");
            std::process::exit(1);
        }
    }
}

async fn run_sync(
    args: &[&str],
    storage: Arc<dyn Storage>,
    jobs: &JobList,
    notes: &NotesStore,
    tasks: &TaskStore,
) {
    let mut client = match GistClient::new(storage) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Failed to set up HTTP client: {e}");
            std::process::exit(1);
        }
    };

    match args {
        ["status"] => match client.state() {
            RemoteState::Disconnected => println!("Not connected"),
            RemoteState::NoDocument => println!("Connected, no gist yet"),
            RemoteState::Bound => {
                println!("Connected, bound to gist {}", client.gist_id().unwrap_or("?"));
            }
        },
        ["connect", token] => {
            match sync::connect(&mut client, token, jobs, notes, tasks).await {
                Ok(ConnectOutcome::InvalidToken) => {
                    eprintln!("GitHub rejected the token");
                    std::process::exit(1);
                }
                Ok(ConnectOutcome::Connected { loaded: true }) => {
                    println!("Connected; loaded remote data");
                }
                Ok(ConnectOutcome::Connected { loaded: false }) => println!("Connected"),
                Err(e) => {
                    eprintln!("Connect failed: {e}");
                    std::process::exit(1);
                }
            }
        }
        ["bind", gist_id] => {
            client.set_gist_id(gist_id);
            println!("Bound to gist {gist_id}");
        }
        ["push"] => match sync::push(&mut client, jobs, notes, tasks).await {
            Ok(PushOutcome::Created(id)) => println!("Uploaded to new gist {id}"),
            Ok(PushOutcome::Updated) => println!("Synced"),
            Err(e) => {
                eprintln!("Sync failed: {e}");
                std::process::exit(1);
            }
        },
        ["pull"] => match sync::pull(&client, jobs, notes, tasks).await {
            Ok(true) => println!("Loaded remote data"),
            Ok(false) => println!("No remote data found"),
            Err(e) => {
                eprintln!("Load failed: {e}");
                std::process::exit(1);
            }
        },
        ["disconnect"] => {
            client.clear_auth();
            println!("Disconnected");
        }
        _ => {
            eprint!("{USAGE}");
            std::process::exit(2);
        }
    }
}
