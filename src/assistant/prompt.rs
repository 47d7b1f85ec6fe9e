// ABOUTME: Prompt construction for natural-language to SQL generation
// ABOUTME: Combines the schema description, usage notes, and output requirements

use once_cell::sync::Lazy;
use regex::Regex;

use crate::schema::{ddl, Schema};

pub const SYSTEM_PROMPT: &str = concat!(
    "You are a PostgreSQL expert who generates accurate SQL queries ",
    "based on natural language questions."
);

const USAGE_NOTES: [&str; 4] = [
    "Always use proper JOINs for foreign key relationships",
    "Naming: Be careful with column names. The table Region has a column Region. \
     The table Country has a column Country. Do not use Region.Name or Country.Name.",
    "To find which Region a Customer is from, you must join: Customer -> Country -> Region.",
    "The OrderDetail table represents individual sales transactions. To calculate total \
     sales amount, you must join Product to get the ProductUnitPrice and multiply it by \
     QuantityOrdered.",
];

const REQUIREMENTS: [&str; 7] = [
    "Generate ONLY the SQL query that I can directly use. No other response.",
    "Use proper JOINs to get descriptive names from lookup tables",
    "Use appropriate aggregations (COUNT, AVG, SUM, etc.) when needed",
    "Add LIMIT clauses for queries that might return many rows (default LIMIT 100)",
    "Use proper date/time functions for TIMESTAMP columns",
    "Make sure the query is syntactically correct for PostgreSQL",
    "Add helpful column aliases using AS",
];

static SQL_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^```sql\s*|\s*```$").expect("Invalid regex"));

/// Build the user message sent to the model for `question`
pub fn build_prompt(schema: &Schema, question: &str) -> String {
    let mut prompt = String::from(
        "You are a PostgreSQL expert. Given the following database schema and a user's \
         question, generate a valid PostgreSQL query.\n\n",
    );

    prompt.push_str(&ddl::describe(schema));
    prompt.push_str("\nIMPORTANT NOTES:\n");
    for note in USAGE_NOTES {
        prompt.push_str(&format!("- {}\n", note));
    }

    prompt.push_str(&format!("\nUser Question: {}\n\nRequirements:\n", question.trim()));
    for (idx, requirement) in REQUIREMENTS.iter().enumerate() {
        prompt.push_str(&format!("{}. {}\n", idx + 1, requirement));
    }
    prompt.push_str("\nGenerate the SQL query:");

    prompt
}

/// Strip Markdown code fences from a model reply
///
/// # Examples
///
/// ```
/// # use postgres_bulk_loader::assistant::prompt::extract_sql;
/// let reply = "```sql\nSELECT * FROM Region;\n```";
/// assert_eq!(extract_sql(reply), "SELECT * FROM Region;");
/// ```
pub fn extract_sql(reply: &str) -> String {
    SQL_FENCE.replace_all(reply, "").trim().to_string()
}
