#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    CompletionReceived(String),
    CompletionFailed(String),
}
