//! Command-line front end for `codelinks_core`.
//!
//! Reads `CODELINKS_*` settings (a `.env` file is honored), runs one use case
//! per invocation and prints the result as JSON.

use clap::{Args, Parser, Subcommand};
use codelinks_core::repo::code_snippet_repo::CodeSnippetQuery;
use codelinks_core::repo::link_repo::LinkListQuery;
use codelinks_core::{
    init_logging, open_unit_of_work_factory, CodeSnippetService, CoreConfig, CurrentUser,
    DbLocation, LinkInput, LinkService, LookupTypeService, PageRequest, RegisterUserRequest,
    SnippetInput, SqliteUnitOfWorkFactory, UserService,
};
use log::info;
use serde::Serialize;
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(author, version, about = "Manage saved links and code snippets.")]
struct Cli {
    /// SQLite database file; overrides CODELINKS_DB_PATH.
    #[arg(long, value_name = "PATH", global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print core health and version.
    Ping,
    /// Insert the default link categories and languages.
    Seed,
    AddUser {
        username: String,
        email: String,
        #[arg(long)]
        display_name: Option<String>,
    },
    AddLink {
        /// Owner username.
        #[arg(long)]
        owner: String,
        url: String,
        title: String,
        #[arg(long)]
        description: Option<String>,
        /// `link_category` code, e.g. `documentation`.
        #[arg(long)]
        category: Option<String>,
    },
    AddSnippet {
        #[arg(long)]
        owner: String,
        title: String,
        /// `language` code, e.g. `rust`.
        #[arg(long)]
        language: String,
        /// Snippet body; use `-` to read from stdin.
        code: String,
        #[arg(long)]
        description: Option<String>,
    },
    ListLinks {
        #[arg(long)]
        owner: Option<String>,
        #[arg(long)]
        search: Option<String>,
        #[command(flatten)]
        page: PageArgs,
    },
    ListSnippets {
        #[arg(long)]
        owner: Option<String>,
        #[arg(long)]
        search: Option<String>,
        #[command(flatten)]
        page: PageArgs,
    },
}

#[derive(Args, Debug)]
struct PageArgs {
    #[arg(long, default_value_t = 1)]
    page: u32,
    #[arg(long = "page-size", default_value_t = codelinks_core::model::page::DEFAULT_PAGE_SIZE)]
    page_size: u32,
}

impl PageArgs {
    fn request(&self) -> PageRequest {
        PageRequest::new(self.page, self.page_size)
    }
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let mut config = CoreConfig::from_env()?;
    if let Some(path) = cli.db {
        config.database = DbLocation::file(path);
    }
    if let Some(log_dir) = config.log_dir.as_deref() {
        init_logging(&config.log_level, log_dir)?;
    }

    if let Command::Ping = cli.command {
        return print_json(&serde_json::json!({
            "ping": codelinks_core::ping(),
            "version": codelinks_core::core_version(),
        }));
    }

    config.require_persistent()?;
    let units = open_unit_of_work_factory(&config, CurrentUser::system())?;
    info!(
        "event=cli_start module=cli status=ok db_mode={}",
        config.database.mode()
    );

    match cli.command {
        Command::Ping => Ok(()),
        Command::Seed => {
            let inserted = LookupTypeService::new(units).seed_defaults()?;
            print_json(&serde_json::json!({ "inserted": inserted }))
        }
        Command::AddUser {
            username,
            email,
            display_name,
        } => {
            let user = UserService::new(units).register_user(&RegisterUserRequest {
                username,
                email,
                display_name,
            })?;
            print_json(&user)
        }
        Command::AddLink {
            owner,
            url,
            title,
            description,
            category,
        } => {
            let owner_id = owner_id(&units, &owner)?;
            let link = LinkService::new(units).add_link(
                owner_id,
                &LinkInput {
                    url,
                    title,
                    description,
                    category_code: category,
                },
            )?;
            print_json(&link)
        }
        Command::AddSnippet {
            owner,
            title,
            language,
            code,
            description,
        } => {
            let owner_id = owner_id(&units, &owner)?;
            let code = if code == "-" {
                std::io::read_to_string(std::io::stdin())?
            } else {
                code
            };
            let snippet = CodeSnippetService::new(units).create_snippet(
                owner_id,
                &SnippetInput {
                    title,
                    language_code: language,
                    code,
                    description,
                },
            )?;
            print_json(&snippet)
        }
        Command::ListLinks {
            owner,
            search,
            page,
        } => {
            let owner_id = owner
                .map(|username| owner_id(&units, &username))
                .transpose()?;
            let links = LinkService::new(units).list_links(&LinkListQuery {
                owner_id,
                search,
                page: page.request(),
                ..LinkListQuery::default()
            })?;
            print_json(&links)
        }
        Command::ListSnippets {
            owner,
            search,
            page,
        } => {
            let owner_id = owner
                .map(|username| owner_id(&units, &username))
                .transpose()?;
            let snippets = CodeSnippetService::new(units).list_snippets(&CodeSnippetQuery {
                owner_id,
                search,
                page: page.request(),
                ..CodeSnippetQuery::default()
            })?;
            print_json(&snippets)
        }
    }
}

fn owner_id(units: &SqliteUnitOfWorkFactory, username: &str) -> Result<Uuid, Box<dyn Error>> {
    match UserService::new(units.clone()).find_by_username(username)? {
        Some(user) => Ok(user.id),
        None => Err(format!("unknown user `{username}`").into()),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
