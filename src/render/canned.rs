//! Fixed replies for small talk and identification questions.

const GREETING: &str = "Hello! How can I help you?";
const FAREWELL: &str = "Thank you for reaching out. Have a great day!";

static REPLIES: &[(&[&str], &str)] = &[
    (&["hi", "hii", "hey", "hai"], GREETING),
    (&["hello", "helloo"], "Hello! How can I assist you today?"),
    (
        &["good morning", "good afternoon", "good evening", "good night"],
        "Hello! What can I help you with?",
    ),
    (
        &["what can you do?"],
        "I can help you with various tasks such as answering questions, providing information, and assisting with your needs. What would you like to know or do?",
    ),
    (
        &["tell me about yourself", "who are you", "who are you?"],
        "I'm a Patient Health Record Assistant. I'll help you with information retrieval and assist you with any questions or tasks you have. Feel free to ask me anything!",
    ),
    (&["can you help me?", "i need assistance"], "Of course! What do you need assistance with?"),
    (&["what is your name?"], "I’m an AI assistant. How can I help you today?"),
    (&["thank you"], "You’re welcome! If you need anything else, feel free to ask."),
    (
        &["goodbye", "see you"],
        "Bye! Have a great day. If you need assistance in the future, feel free to reach out.",
    ),
    (
        &["how can you assist me?"],
        "I can provide information, answer questions, and help with various tasks. What do you need help with?",
    ),
    (
        &["what are the next steps?"],
        "Let me know what you’re referring to, and I can guide you through the next steps.",
    ),
    (
        &["do you understand me?"],
        "Yes, I’m programmed to understand and respond to your questions. What would you like to know?",
    ),
    (
        &["can you give me some advice?"],
        "I can offer guidance and information based on your needs. How can I help you?",
    ),
    (
        &["can you remind me of something?"],
        "I can help with reminders if you provide me with the details. What do you need a reminder for?",
    ),
    (
        &["what’s the status of my request?"],
        "I can check the status if you provide me with details of your request. What is your request about?",
    ),
    (
        &["i need more information"],
        "I’m here to provide details. What specific information are you looking for?",
    ),
    (&["see you later", "thanks", "bye", "i’m done"], FAREWELL),
    (
        &["is age a valid identifier?"],
        "For identification purposes, we primarily use ID numbers. Age alone cannot replace an ID. Please provide your ID for accurate processing.",
    ),
    (
        &["is dob an acceptable identifier?"],
        "We need your ID for proper identification purposes. Please provide your ID number.",
    ),
    (
        &["are there alternative ways to identify myself?"],
        "We require an ID number for proper identification. Please provide your ID.",
    ),
    (
        &["is email address acceptable instead of id?"],
        "For identification and security reasons, an ID number is necessary. Providing a name, email address, or phone number alone is not sufficient. Please provide your ID number.",
    ),
    (
        &["how do i view my medical history?"],
        "Please provide your ID to access your complete medical history and details on your conditions.",
    ),
    (
        &["can i query specific health conditions from my records?"],
        "Yes, please specify the health condition and provide your ID for accurate information.",
    ),
    (
        &["what identification is required to access my medical records?"],
        "For accessing your medical records, an ID number is required. Please provide your ID for accurate processing.",
    ),
    (
        &["is it possible to access records with just a phone number?"],
        "For security reasons, a phone number alone is not sufficient to access records. An ID number is required.",
    ),
];

/// Exact, case-insensitive lookup. Surrounding whitespace is ignored.
#[must_use]
pub fn canned_reply(question: &str) -> Option<&'static str> {
    let q = question.trim().to_lowercase();
    REPLIES.iter().find(|(keys, _)| keys.contains(&q.as_str())).map(|(_, reply)| *reply)
}
