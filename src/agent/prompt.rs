pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant. Answer the user in their native language, inferred from their message.";

pub const CLASSIFIER_SYSTEM_PROMPT: &str = r#"You are a tool that detects whether the conversation is related to food in any way, even indirectly: mentions of food, questions about favorite food, eating habits, meals, ingredients or cooking.
Do not take into consideration whether you have access to information about people.
Answer with a JSON object."#;

pub const EXTRACTOR_SYSTEM_PROMPT: &str = r#"Extract the name of the person the text is about.
If no person is named, omit the name field.
Answer with a JSON object."#;

pub const FAVORITE_FOOD_TOOL_DESCRIPTION: &str =
    "Finds the favorite food of a person by their name. Use it whenever the user asks what someone likes to eat.";

pub fn food_found_fact(person: &str, food: &str) -> String {
    format!(
        "From a query executed in a database, the favorite food of {person} is {food}. Now that you know, you must explain it to the user."
    )
}

pub fn food_unknown_fact(person: &str) -> String {
    format!(
        "A database lookup for the favorite food of {person} returned no answer, so it is unknown. Tell the user you do not know it and do not guess."
    )
}
