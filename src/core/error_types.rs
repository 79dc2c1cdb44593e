//! Shared constants for error envelopes, diagnostic messages and setup hints.

pub const MESSAGE_REQUIRED: &str = "Message is required";
pub const INVALID_API_KEY: &str =
    "Invalid API key. Please check your GROQ_API_KEY in the .env file.";
pub const RATE_LIMIT_EXCEEDED: &str =
    "Rate limit exceeded. Please wait a moment before trying again.";
pub const NETWORK_ERROR: &str = "Network error. Please check your internet connection.";
pub const STREAMING_INTERRUPTED: &str = "Streaming interrupted";
pub const STREAM_TIMED_OUT: &str = "Stream timed out";
pub const FAILED_TO_START_STREAM: &str = "Failed to start stream";
pub const FAILED_TO_GENERATE_RESPONSE: &str = "Failed to generate response";
pub const INVALID_JSON_BODY: &str = "Invalid JSON body";

pub const SERVER_RUNNING: &str = "Server is running!";
pub const API_CONFIGURED: &str = "Groq API configured and ready!";

/// Heading prepended to every diagnostic token produced for an upstream failure.
pub const API_ERROR_HEADING: &str = "❌ **API Error**\n\n";

/// Heading of the upfront token emitted by the mock source.
pub const API_KEY_REQUIRED_HEADING: &str = "⚠️ **API Key Required**";

/// Setup instructions shown to the user when no API key is configured.
pub const API_KEY_WARNING: &str = "⚠️ **API Key Required**

To use real AI responses, please:

1. Get a free API key from [Groq Console](https://console.groq.com/)
2. Create a `.env` file in the backend folder
3. Add: `GROQ_API_KEY=your_actual_key_here`
4. Restart the server

*Currently using mock responses.*";

/// Setup steps printed in the startup banner when no key is configured.
pub const SETUP_STEPS: &[&str] = &[
    "Get free API key: https://console.groq.com/",
    "Create backend/.env file",
    "Add: GROQ_API_KEY=your_actual_key_here",
    "Restart server",
];

/// System prompt sent with every upstream request.
pub const SYSTEM_PROMPT: &str = "You are a helpful, knowledgeable, and friendly AI assistant. \
Provide clear, detailed, and useful responses. When showing code examples, always use proper \
markdown code blocks with language specification (e.g., ```javascript, ```python, ```html, etc.). \
Use single backticks for inline code elements. Format your responses with proper markdown for \
better readability.";
