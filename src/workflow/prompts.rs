/// Prompt templates for the SQL review steps

/// Reply the model gives when no listed table fits the question
pub const NONE_IDENTIFIED: &str = "NONE_IDENTIFIED";

/// Label that makes the workflow stop right after classification
pub const FACT_CHECK: &str = "Fact_Check";

/// Menu shown to the reviewer when a draft is ready
pub const REVIEW_TASK: &str =
    "Please provide feedback from any of the following options 1.REGENERATE 2.CONTINUE 3.ADDITIONAL_INPUT";

pub fn classify(question: &str) -> String {
    format!(
        "You are an assistant who classifies the user's question into exactly one of:\n\
         1. {FACT_CHECK}\n\
         2. Simulation\n\
         3. Other\n\
         Answer with the label only.\n\n\
         Here is the question:\n{question}"
    )
}

pub fn select_tables(question: &str, tables: &[String]) -> String {
    format!(
        "You are an expert SQL assistant who identifies the tables needed to answer a question.\n\
         List of available tables: {tables}\n\
         DO NOT come up with table names. Only choose from the list of tables.\n\
         Answer with a comma separated list of table names.\n\
         If no tables are identified return only {NONE_IDENTIFIED}.\n\n\
         Here is the question:\n{question}",
        tables = tables.join(", "),
    )
}

pub fn generate_query(question: &str, schema: &str, rejected_draft: Option<&str>) -> String {
    let mut prompt = format!(
        "You are a database expert who writes SQL for a SQLite database.\n\
         Given an input question, create a syntactically correct SQLite query.\n\
         Unless the user asks for a specific number of rows, limit the query to at most 3 results.\n\
         Order the results by a relevant column to return the most interesting rows.\n\
         Never select all the columns of a table, only the columns relevant to the question.\n\
         DO NOT write any DML statements (INSERT, UPDATE, DELETE, DROP etc.).\n\
         Only query the tables described in the schema below.\n\
         Answer with the SQL query only.\n\n\
         question: {question}\n\
         schema_desc: {schema}"
    );
    if let Some(draft) = rejected_draft {
        prompt.push_str(&format!(
            "\n\nThe reviewer asked for a new query. Previous draft:\n{draft}"
        ));
    }
    prompt
}
