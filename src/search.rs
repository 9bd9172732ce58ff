//! CLI front-ends for retrieval: `rag search` and `rag ask`.

use anyhow::Result;

use crate::service::ServiceContext;

/// Print the ranked chunks for `query`.
pub fn run_search(ctx: &ServiceContext, query: &str, k: Option<usize>) -> Result<()> {
    let hits = ctx.search(query, k);
    if ctx.current().demo {
        println!("(demo index)");
    }
    if hits.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, hit) in hits.iter().enumerate() {
        println!("{}. [{:.4}] {}", i + 1, hit.score, hit.source_label);
        println!("    excerpt: \"{}\"", excerpt(&hit.chunk_text, 160));
        println!();
    }
    Ok(())
}

/// Print the answer and its sources for `question`.
pub async fn run_ask(ctx: &ServiceContext, question: &str) -> Result<()> {
    let answer = ctx.ask(question).await?;
    println!("{}", answer.answer);
    println!();
    println!("sources: {}", answer.sources.join(", "));
    Ok(())
}

fn excerpt(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        flat
    } else {
        format!("{}…", flat.chars().take(max_chars).collect::<String>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excerpt_flattens_and_truncates() {
        assert_eq!(excerpt("a\n\n b  c", 10), "a b c");
        assert_eq!(excerpt("abcdef", 3), "abc…");
    }
}
