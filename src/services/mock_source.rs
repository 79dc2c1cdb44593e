//! Deterministic fallback token source.
//!
//! Used whenever no upstream credential is configured. The response text is a
//! pure function of the input message so tests can rely on exact output.

use crate::core::error_types::{API_KEY_REQUIRED_HEADING, API_KEY_WARNING};
use crate::core::metrics::get_metrics;
use crate::services::model_catalog::ModelSelection;
use crate::services::token_source::{Token, TokenSource, TokenStream};
use futures::stream::{self, StreamExt};

/// Canned response templates, picked by [`template_index`].
const TEMPLATES: &[&str] = &[
    "⚠️ **API Key Required**: To get real AI responses, please add your Groq API key to the `.env` file.\n\n",
    "Here's how to set it up:\n\n",
    "1. Get a free API key from [Groq Console](https://console.groq.com)\n",
    "2. Create a `.env` file in the backend directory\n",
    "3. Add: `GROQ_API_KEY=your_key_here`\n\n",
    "**Sample code example:**\n\n",
    "```javascript\n",
    "// JavaScript example\n",
    "function greet(name) {\n",
    "  return `Hello, ${name}!`;\n",
    "}\n",
    "\n",
    "console.log(greet('World'));\n",
    "```\n\n",
    "```python\n",
    "# Python example\n",
    "def calculate_fibonacci(n):\n",
    "    if n <= 1:\n",
    "        return n\n",
    "    return calculate_fibonacci(n-1) + calculate_fibonacci(n-2)\n",
    "\n",
    "print(calculate_fibonacci(10))\n",
    "```\n\n",
    "For now, you're seeing this mock response. The UI features like search, favorites, and `inline code` highlighting are all working!\n\n",
    // Last slot echoes the question back; see `base_template`.
    "Questions about: **{message}**",
];

const CODE_EXAMPLE: &str = "\n\n```javascript
// Example code snippet
function example() {
  console.log('This is a sample function!');
  return 'Hello World';
}

example();
```

This demonstrates the concept we discussed with practical implementation.";

// Line 2 keeps its two trailing spaces (markdown line break)
const EXPLANATION: &str = concat!(
    "\n\n**Detailed Explanation:**\n",
    "\n",
    "1. **First Point**: This covers the basic concept\n",
    "2. **Second Point**: Here we dive deeper into the mechanics  \n",
    "3. **Third Point**: Finally, we look at practical applications\n",
    "\n",
    "This step-by-step breakdown should help clarify the topic for you."
);

const LIST: &str = "\n\n**Here's a comprehensive list:**

• **Item 1**: Important first consideration
• **Item 2**: Key second element
• **Item 3**: Critical third factor
• **Item 4**: Essential fourth component

Each of these points contributes to the overall understanding.";

/// Contextual block appended to the base template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextBlock {
    Code,
    Explanation,
    List,
}

impl ContextBlock {
    /// First matching keyword group wins.
    pub fn detect(message: &str) -> Option<Self> {
        let lowered = message.to_lowercase();
        let has_any = |words: &[&str]| words.iter().any(|w| lowered.contains(w));

        if has_any(&["code", "programming", "function"]) {
            Some(ContextBlock::Code)
        } else if has_any(&["explain", "how"]) {
            Some(ContextBlock::Explanation)
        } else if has_any(&["list", "steps"]) {
            Some(ContextBlock::List)
        } else {
            None
        }
    }

    pub fn text(self) -> &'static str {
        match self {
            ContextBlock::Code => CODE_EXAMPLE,
            ContextBlock::Explanation => EXPLANATION,
            ContextBlock::List => LIST,
        }
    }
}

/// Template slot for `message`: sum of UTF-16 code units modulo template count.
pub fn template_index(message: &str) -> usize {
    let sum: u64 = message.encode_utf16().map(u64::from).sum();
    (sum % TEMPLATES.len() as u64) as usize
}

fn base_template(message: &str) -> String {
    TEMPLATES[template_index(message)].replace("{message}", message)
}

/// Full mock response body for `message` (without the upfront setup token).
pub fn mock_response(message: &str) -> String {
    let mut response = base_template(message);
    if let Some(block) = ContextBlock::detect(message) {
        response.push_str(block.text());
    }
    response
}

/// Upfront token content telling the user how to configure a key.
pub fn setup_notice(requested_model: &str) -> String {
    format!(
        "{} (Requested: {})\n\n{}",
        API_KEY_REQUIRED_HEADING, requested_model, API_KEY_WARNING
    )
}

/// Complete mock token sequence for one request.
///
/// One setup token, then one token per space-separated word of
/// [`mock_response`]. Every word but the last keeps its trailing space, so
/// concatenating the word tokens reproduces the response exactly.
pub fn mock_tokens(message: &str, requested_model: &str) -> Vec<Token> {
    let response = mock_response(message);
    let words: Vec<&str> = response.split(' ').collect();
    let last = words.len() - 1;

    let mut tokens = Vec::with_capacity(words.len() + 1);
    tokens.push(Token::partial(setup_notice(requested_model)));
    tokens.extend(words.into_iter().enumerate().map(|(i, word)| {
        if i == last {
            Token::last(word)
        } else {
            Token::partial(format!("{} ", word))
        }
    }));
    tokens
}

/// Token source that never leaves the process.
#[derive(Debug, Clone, Default)]
pub struct MockTokenSource;

impl MockTokenSource {
    pub fn new() -> Self {
        Self
    }
}

impl TokenSource for MockTokenSource {
    fn generate(&self, prompt: &str, model: &ModelSelection) -> TokenStream {
        get_metrics().mock_responses.inc();
        tracing::debug!(
            requested_model = %model.requested_model,
            "Generating mock response (no API key configured)"
        );

        stream::iter(mock_tokens(prompt, &model.requested_model).into_iter().map(Ok)).boxed()
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
