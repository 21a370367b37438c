pub mod gemini;

pub use gemini::GeminiBackend;
