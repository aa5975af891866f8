// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rusqlite::Connection;

use petclinic::{
    count_rows, edit, open_database, open_schema, seed_demo_data, DatabaseLocation, Error, Table,
    VetSpecialty, VetSpecialtyKey,
};

#[derive(Parser)]
#[command(name = "petclinic", version, about = "Veterinary clinic records")]
struct Cli {
    /// SQLite database file, or :memory: for a seeded throwaway database
    #[arg(long, global = true, env = "PETCLINIC_DATABASE", default_value = "petclinic.db")]
    database: DatabaseLocation,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Create the schema and load the demo data
    Init {
        /// Only create the schema
        #[arg(long)]
        no_seed: bool,
    },
    /// Browse and edit records in the terminal (default)
    Ui,
    /// Print the rows of a table
    List {
        /// owners, pets, visits, vets, vet-specialties, pet-types or specialties
        table: Table,
        /// Only rows whose searchable columns contain this text
        #[arg(long)]
        search: Option<String>,
    },
    /// Give a vet a specialty
    Link { vet: i64, specialty: i64 },
    /// Take a specialty away from a vet
    Unlink { vet: i64, specialty: i64 },
}

fn main() -> Result<()> {
    petclinic::init_logging();

    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Ui);

    // init decides on seeding itself, so an in-memory database starts empty there
    let conn = match command {
        Command::Init { .. } => open_schema(&cli.database),
        _ => open_database(&cli.database),
    }
    .with_context(|| format!("Failed to open database {}", cli.database))?;

    match command {
        Command::Init { no_seed } => run_init(&conn, no_seed),
        Command::Ui => run_ui_mode(conn),
        Command::List { table, search } => run_list(&conn, table, search.as_deref()),
        Command::Link { vet, specialty } => run_link(&conn, vet, specialty),
        Command::Unlink { vet, specialty } => run_unlink(&conn, vet, specialty),
    }
}

fn run_init(conn: &Connection, no_seed: bool) -> Result<()> {
    println!("🔧 Database schema ready");

    if !no_seed {
        let inserted = seed_demo_data(conn)?;
        if inserted > 0 {
            println!("✓ Loaded {} demo rows", inserted);
        } else {
            println!("✓ Demo data already present");
        }
    }

    for table in Table::ALL {
        let count = count_rows(conn, table.table_name())?;
        println!("   {:<16} {}", table.caption(), count);
    }

    Ok(())
}

fn run_list(conn: &Connection, table: Table, search: Option<&str>) -> Result<()> {
    let rows = table.rows(conn, None, search)?;
    let headers = table.headers();

    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(&row.cells) {
            *width = (*width).max(cell.chars().count());
        }
    }

    println!("{}", format_line(headers, &widths));
    for row in &rows {
        let cells: Vec<&str> = row.cells.iter().map(String::as_str).collect();
        println!("{}", format_line(&cells, &widths));
    }
    println!("\n{} {}", rows.len(), table.caption().to_lowercase());

    Ok(())
}

fn format_line(cells: &[&str], widths: &[usize]) -> String {
    cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
        .collect::<Vec<_>>()
        .join("  ")
        .trim_end()
        .to_string()
}

fn run_link(conn: &Connection, vet: i64, specialty: i64) -> Result<()> {
    match edit::insert(conn, &VetSpecialty::new(vet, specialty)) {
        Ok(key) => {
            println!("✓ Linked vet {} to specialty {}", key.vet, key.specialty);
            Ok(())
        }
        Err(Error::Validation(err)) => {
            eprintln!("❌ {}", err);
            std::process::exit(1);
        }
        Err(err) => Err(err.into()),
    }
}

fn run_unlink(conn: &Connection, vet: i64, specialty: i64) -> Result<()> {
    edit::delete::<VetSpecialty>(conn, VetSpecialtyKey { vet, specialty })?;
    println!("✓ Unlinked vet {} from specialty {}", vet, specialty);
    Ok(())
}

#[cfg(feature = "tui")]
fn run_ui_mode(conn: Connection) -> Result<()> {
    let mut app = ui::App::new(conn)?;
    ui::run_ui(&mut app)?;
    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_conn: Connection) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use the REST server: cargo run --bin petclinic-server --features server");
    std::process::exit(1);
}
