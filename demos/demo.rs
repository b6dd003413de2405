use sqlwrap::*;

fn main() -> Result<()> {
    println!("SQLite Marshaling Demo\n");

    let mut db = Database::open_in_memory()?;

    // Create table "users"
    let schema = Row::new(vec![
        Column::primary_key("id", Value::witness(DataType::Integer)),
        Column::typed("name", DataType::Text),
        Column::typed("age", DataType::Integer),
    ]);
    db.create_table("users", &schema)?;
    println!("Created table 'users'");

    // Insert one row as literals, then a batch in one transaction
    println!("Inserting data...");
    db.insert_row(
        "users",
        &Row::from_pairs([
            ("id", Value::Integer(1)),
            ("name", Value::from("Alice")),
            ("age", Value::Integer(30)),
        ]),
    )?;

    let mut batch = Table::from_schema(&schema);
    batch.push_row(vec![Value::Integer(2), Value::from("Bob"), Value::Integer(41)])?;
    batch.push_row(vec![Value::Integer(3), Value::from("Charlie"), Value::Integer(25)])?;
    let inserted = db.insert_table("users", &batch)?;
    println!("Inserted {} rows\n", inserted + 1);

    // Read and print data
    println!("Reading data:");
    println!("{:<5} {:<10} {:<5}", "ID", "NAME", "AGE");
    println!("{}", "-".repeat(25));

    let table = db.select("users", &ColumnsSelect::Star)?;
    for row in table.rows() {
        let id = row.value("id").map(Value::to_display_string).unwrap_or_default();
        let name = row.value("name").map(Value::to_display_string).unwrap_or_default();
        let age = row.value("age").map(Value::to_display_string).unwrap_or_default();
        println!("{:<5} {:<10} {:<5}", id, name, age);
    }
    println!();

    // Settings on top of the same connection
    settings::reset(&db)?;
    let mut prefs = Settings::new();
    prefs.set(&db, "theme", "dark")?;
    prefs.set(&db, "font_size", 14i64)?;
    println!("Settings as JSON:");
    println!("{}", prefs.to_json());

    db.close()
}
