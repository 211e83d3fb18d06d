const CREATE_USER_TABLE: &str = "CREATE TABLE IF NOT EXISTS app_user (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  name TEXT NOT NULL,
  email TEXT NOT NULL UNIQUE,
  credential TEXT NOT NULL,
  created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
)";

const CREATE_CATEGORY_TABLE: &str = "CREATE TABLE IF NOT EXISTS category (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  name TEXT NOT NULL UNIQUE
)";

const CREATE_EXPENSE_TABLE: &str = "CREATE TABLE IF NOT EXISTS expense (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  amount INTEGER NOT NULL CHECK (amount > 0),
  category_id INTEGER NOT NULL REFERENCES category (id) ON DELETE RESTRICT,
  description TEXT,
  payer INTEGER NOT NULL REFERENCES app_user (id),
  created_at DATETIME NOT NULL
)";

const CREATE_SHARED_SPLIT_TABLE: &str = "CREATE TABLE IF NOT EXISTS shared_split (
  expense_id INTEGER NOT NULL REFERENCES expense (id) ON DELETE CASCADE,
  paid_by INTEGER NOT NULL REFERENCES app_user (id),
  owed_by INTEGER NOT NULL REFERENCES app_user (id),
  amount INTEGER NOT NULL CHECK (amount > 0),
  UNIQUE(expense_id, owed_by)
)";

const CREATE_SETTLED_DEBT_TABLE: &str = "CREATE TABLE IF NOT EXISTS settled_debt (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  expense_id INTEGER REFERENCES expense (id) ON DELETE SET NULL,
  owed_by INTEGER NOT NULL REFERENCES app_user (id),
  paid_to INTEGER NOT NULL REFERENCES app_user (id),
  amount INTEGER NOT NULL CHECK (amount > 0),
  settled_at DATETIME NOT NULL
)";

// Standalone settlements are deduplicated by the balance check instead.
const CREATE_SETTLED_DEBT_INDEX: &str =
    "CREATE UNIQUE INDEX IF NOT EXISTS settled_debt_unique_tuple
  ON settled_debt (expense_id, owed_by, paid_to, amount)
  WHERE expense_id IS NOT NULL";

pub fn create_all_tables(connection: &rusqlite::Connection) -> anyhow::Result<()> {
    connection.execute_batch("PRAGMA foreign_keys = ON;")?;
    connection.execute(CREATE_USER_TABLE, ())?;
    connection.execute(CREATE_CATEGORY_TABLE, ())?;
    connection.execute(CREATE_EXPENSE_TABLE, ())?;
    connection.execute(CREATE_SHARED_SPLIT_TABLE, ())?;
    connection.execute(CREATE_SETTLED_DEBT_TABLE, ())?;
    connection.execute(CREATE_SETTLED_DEBT_INDEX, ())?;
    Ok(())
}
