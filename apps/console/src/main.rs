use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use client_core::{
    load_settings, notes_cascade, FetchError, HttpResourceApi, ListController, ListView, Phase,
    ReassignWorkflow, ResourceApi, Settlement, WorkflowFailure,
};
use shared::domain::{EntityId, Record, Resource};
use tokio::task::JoinHandle;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Cli {
    /// Overrides the configured API base URL.
    #[arg(long)]
    api_base_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ResourceArg {
    Employees,
    Customers,
    Notes,
}

impl From<ResourceArg> for Resource {
    fn from(arg: ResourceArg) -> Self {
        match arg {
            ResourceArg::Employees => Resource::Employees,
            ResourceArg::Customers => Resource::Customers,
            ResourceArg::Notes => Resource::Notes,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// One page of a collection.
    List {
        resource: ResourceArg,
        #[arg(long, default_value_t = 0)]
        page: u32,
        #[arg(long)]
        size: Option<u32>,
        #[arg(long, default_value = "")]
        search: String,
    },
    /// Customers of an employee, or notes of one of those customers.
    Notes {
        #[arg(long)]
        employee: i64,
        #[arg(long)]
        customer: Option<i64>,
    },
    /// Move an employee's customers to a replacement, then delete the employee.
    Reassign {
        #[arg(long)]
        employee: i64,
        #[arg(long)]
        replacement: Option<i64>,
        #[arg(long)]
        department: Option<String>,
        /// Submit without the interactive confirmation.
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let cli = Cli::parse();

    let mut settings = load_settings();
    if let Some(url) = cli.api_base_url {
        settings.api_base_url = url;
    }
    let api: Arc<dyn ResourceApi> =
        Arc::new(HttpResourceApi::from_settings(&settings).context("invalid client settings")?);
    info!(base_url = %settings.api_base_url, "using backend");

    match cli.command {
        Command::List {
            resource,
            page,
            size,
            search,
        } => {
            if let Some(size) = size {
                if !settings.page_size_options.contains(&size) {
                    bail!(
                        "page size {size} is not one of {:?}",
                        settings.page_size_options
                    );
                }
            }
            let size = size.unwrap_or(settings.default_page_size);
            let mut list = ListController::collection(api, resource.into(), size);
            await_settlement(list.set_search_term(search)).await?;
            if page > 0 {
                if let Some(err) = list.view().error {
                    return Err(report(&err));
                }
                let Some(fetch) = list.set_page(page) else {
                    bail!("page {page} is out of range");
                };
                fetch.await?;
            }
            print_view(&list.view())?;
        }
        Command::Notes { employee, customer } => {
            let mut cascade = notes_cascade(api, settings.default_page_size);
            await_settlement(cascade.select_parent(Some(EntityId(employee)))).await?;
            print_view(&cascade.child_list().view())?;
            if let Some(customer) = customer {
                let Some(fetch) = cascade.select_child(Some(EntityId(customer))) else {
                    bail!("customer {customer} is not listed for employee {employee}");
                };
                fetch.await?;
                println!("notes for customer {customer}:");
                print_view(&cascade.next().child_list().view())?;
            }
        }
        Command::Reassign {
            employee,
            replacement,
            department,
            yes,
        } => {
            let mut workflow =
                ReassignWorkflow::new(api, EntityId(employee), settings.candidate_page_size);
            if let Some(load) = workflow.load() {
                load.await?;
            }
            if let Some(WorkflowFailure::Load(err)) = workflow.failure() {
                bail!("could not load employee {employee}: {}", err.user_message());
            }
            workflow.set_department_filter(department);

            let Some(replacement) = replacement else {
                println!("departments: {}", workflow.departments().join(", "));
                for candidate in workflow.visible_candidates() {
                    println!("{}", describe(&candidate));
                }
                return Ok(());
            };

            if !workflow.choose_replacement(EntityId(replacement)) {
                bail!("{replacement} is not an eligible replacement for {employee}");
            }
            workflow.request_confirmation();
            if !yes {
                println!("re-run with --yes to reassign and delete employee {employee}");
                workflow.cancel_confirmation();
                return Ok(());
            }
            let Some(submit) = workflow.confirm() else {
                bail!("reassignment was not ready to submit");
            };
            match submit.await? {
                Phase::Succeeded => println!("employee {employee} deleted"),
                _ => {
                    let message = match workflow.failure() {
                        Some(WorkflowFailure::Submit(err)) => err.user_message(),
                        _ => "unknown failure".to_string(),
                    };
                    bail!("reassignment failed: {message}");
                }
            }
        }
    }

    Ok(())
}

async fn await_settlement(handle: Option<JoinHandle<Settlement>>) -> Result<()> {
    if let Some(handle) = handle {
        handle.await?;
    }
    Ok(())
}

fn print_view(view: &ListView) -> Result<()> {
    if let Some(err) = &view.error {
        return Err(report(err));
    }
    if view.is_empty() {
        println!("no records");
        return Ok(());
    }
    for record in &view.items {
        println!("{}", describe(record));
    }
    println!(
        "page {} of {} ({} total)",
        view.page + 1,
        view.total_pages.max(1),
        view.total_elements
    );
    Ok(())
}

fn describe(record: &Record) -> String {
    let attributes = serde_json::to_string(&record.attributes).unwrap_or_default();
    format!("#{} {attributes}", record.id)
}

fn report(err: &FetchError) -> anyhow::Error {
    anyhow::anyhow!("{}", err.user_message())
}
