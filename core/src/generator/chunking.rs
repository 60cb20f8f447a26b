//! Line-by-line re-chunking of streamed text

use crate::error::Result;
use crate::llm::TextStream;
use async_stream::try_stream;
use futures::{Stream, StreamExt};
use std::time::Duration;

/// Re-emit `stream` as whole lines, newline included, pausing `delay`
/// between lines; a trailing partial line is emitted when the input ends
pub fn into_lines(stream: TextStream, delay: Duration) -> TextStream {
    Box::pin(lines(stream, delay))
}

fn lines(mut stream: TextStream, delay: Duration) -> impl Stream<Item = Result<String>> + Send {
    try_stream! {
        let mut pending = String::new();
        let mut first = true;

        while let Some(fragment) = stream.next().await {
            pending.push_str(&fragment?);
            while let Some(pos) = pending.find('\n') {
                let line: String = pending.drain(..=pos).collect();
                if !first && !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                first = false;
                yield line;
            }
        }

        if !pending.is_empty() {
            if !first && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            yield pending;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::registry::ProviderKind;
    use futures::stream;

    fn source(fragments: &[&str]) -> TextStream {
        let items: Vec<Result<String>> = fragments.iter().map(|f| Ok(f.to_string())).collect();
        Box::pin(stream::iter(items))
    }

    async fn collect(stream: TextStream) -> Vec<String> {
        stream.map(|item| item.unwrap()).collect().await
    }

    #[tokio::test]
    async fn test_fragments_regrouped_into_lines() {
        let lines = collect(into_lines(
            source(&["descr", "ibe('add', () => {\n  it(", "'adds');\n});"]),
            Duration::ZERO,
        ))
        .await;

        assert_eq!(
            lines,
            vec!["describe('add', () => {\n", "  it('adds');\n", "});"]
        );
    }

    #[tokio::test]
    async fn test_concatenation_is_preserved() {
        let fragments = ["a\n\nb", "", "\nc\n"];
        let lines = collect(into_lines(source(&fragments), Duration::from_millis(1))).await;
        assert_eq!(lines.concat(), fragments.concat());
        assert_eq!(lines, vec!["a\n", "\n", "b\n", "c\n"]);
    }

    #[tokio::test]
    async fn test_errors_pass_through() {
        let failure = ProviderError::EmptyResponse {
            provider: ProviderKind::OpenAI,
        };
        let items: Vec<Result<String>> = vec![Ok("line\n".to_string()), Err(failure.into())];
        let mut lines = into_lines(Box::pin(stream::iter(items)), Duration::ZERO);

        assert_eq!(lines.next().await.unwrap().unwrap(), "line\n");
        assert!(lines.next().await.unwrap().is_err());
    }
}
