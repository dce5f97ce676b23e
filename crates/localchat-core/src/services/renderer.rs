use crate::models::Message;

/// Markdown/math renderer supplied by the front end.
///
/// Receives sanitized text using `$$...$$` for block math and `$...$` for
/// inline math.
pub trait MessageRenderer {
    type Output;

    fn render(&self, text: &str) -> Self::Output;
}

/// What the front end should draw for one message
#[derive(Clone, Debug, PartialEq)]
pub enum DisplayContent<T> {
    /// Rendered markdown
    Rendered(T),
    /// Failure notice; shown verbatim and styled as an error
    Error(String),
}

/// Route a message through the renderer, keeping error messages out of it
pub fn display_content<R: MessageRenderer>(
    message: &Message,
    renderer: &R,
) -> DisplayContent<R::Output> {
    if message.is_error() {
        DisplayContent::Error(message.content().to_string())
    } else {
        DisplayContent::Rendered(renderer.render(message.content()))
    }
}
