//! Canned requests for SQL generation and result analysis.

use crate::llm::TaskType;
use crate::orchestrator::CompletionRequest;
use serde_json::Value;

const SQL_RULES: &str = "\
Rules:
1. Only generate SELECT queries for safety
2. Use proper PostgreSQL syntax
3. Include only the SQL query in your response, no explanations
4. Ensure the query is safe and won't cause performance issues";

const ANALYST_PROMPT: &str = "\
You are a data analyst. Analyze the provided query results and provide insights.
Present your analysis in a clear, structured format with:
1. Summary of the data
2. Key insights and patterns
3. Recommendations if applicable";

/// A request asking the model to turn `natural_query` into one SQL query.
///
/// `schema` describes the tables; `context` is free-form extra guidance.
/// Either may be empty.
pub fn sql_generation(natural_query: &str, schema: &str, context: &str) -> CompletionRequest {
    let system = format!(
        "You are a PostgreSQL expert. Generate SQL queries based on natural language requests.\n\n\
         Database Schema:\n{schema}\n\n\
         Additional Context:\n{context}\n\n\
         {SQL_RULES}"
    );
    CompletionRequest::new(format!("Generate SQL query for: {natural_query}"))
        .system_prompt(system)
        .task(TaskType::Complex)
}

/// A request asking the model to analyze `results` of `query`.
pub fn data_analysis(query: &str, results: &Value, analysis_request: &str) -> CompletionRequest {
    let results = serde_json::to_string_pretty(results).unwrap_or_else(|_| results.to_string());
    let prompt = format!(
        "SQL Query: {query}\n\n\
         Query Results: {results}\n\n\
         Analysis Request: {analysis_request}\n\n\
         Please provide a detailed analysis of this data."
    );
    CompletionRequest::new(prompt).system_prompt(ANALYST_PROMPT)
}

/// Pull the SQL out of a model reply, dropping Markdown code fences and
/// surrounding whitespace.
pub fn extract_sql(reply: &str) -> String {
    let trimmed = reply.trim();
    let Some(start) = trimmed.find("```") else {
        return trimmed.to_string();
    };
    let body = &trimmed[start + 3..];
    // Skip the info string (e.g. "sql") on the opening fence line.
    let body = body.split_once('\n').map_or("", |(_, rest)| rest);
    let body = body.find("```").map_or(body, |end| &body[..end]);
    body.trim().to_string()
}
