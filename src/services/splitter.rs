/// Paragraph-oriented chunker for extracted textbook content. Groups
/// paragraphs into word-bounded windows with a word-level overlap so no
/// clinical statement is cut mid-context.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size_min: usize,
    chunk_size_max: usize,
    chunk_overlap: usize,
}

#[derive(Debug, Clone)]
pub struct ChunkPiece {
    pub text: String,
    pub chunk_index: usize,
    pub word_count: usize,
}

const MIN_PARAGRAPH_CHARS: usize = 50;

impl TextSplitter {
    pub fn new(chunk_size_min: usize, chunk_size_max: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size_min: chunk_size_min.max(1),
            chunk_size_max: chunk_size_max.max(chunk_size_min.max(1)),
            chunk_overlap,
        }
    }

    pub fn split(&self, text: &str) -> Vec<ChunkPiece> {
        let paragraphs = split_paragraphs(text);
        let chunks = self.group_paragraphs(&paragraphs);

        chunks
            .into_iter()
            .enumerate()
            .map(|(chunk_index, text)| {
                let word_count = text.split_whitespace().count();
                ChunkPiece {
                    text,
                    chunk_index,
                    word_count,
                }
            })
            .collect()
    }

    fn group_paragraphs(&self, paragraphs: &[String]) -> Vec<String> {
        let mut chunks: Vec<String> = Vec::new();
        let mut current: Vec<String> = Vec::new();
        let mut current_words = 0usize;

        for paragraph in paragraphs {
            let para_words = paragraph.split_whitespace().count();

            if current_words + para_words > self.chunk_size_max && !current.is_empty() {
                chunks.push(current.join(" "));

                let overlap = self.overlap_text(&current);
                current = match overlap {
                    Some(text) => vec![text, paragraph.clone()],
                    None => vec![paragraph.clone()],
                };
                current_words = current.iter().map(|p| p.split_whitespace().count()).sum();
            } else {
                current.push(paragraph.clone());
                current_words += para_words;
            }
        }

        if !current.is_empty() {
            chunks.push(current.join(" "));
        }

        chunks
    }

    fn overlap_text(&self, paragraphs: &[String]) -> Option<String> {
        if self.chunk_overlap == 0 {
            return None;
        }
        let last = paragraphs.last()?;
        let words: Vec<&str> = last.split_whitespace().collect();

        if words.len() <= self.chunk_overlap {
            return Some(last.clone());
        }
        Some(words[words.len() - self.chunk_overlap..].join(" "))
    }

    pub fn min_words(&self) -> usize {
        self.chunk_size_min
    }
}

/// Blank lines delimit paragraphs. Each paragraph is whitespace-normalized,
/// stripped of "Page N" artifacts, and dropped when too short to carry
/// content (running headers, stray footers).
fn split_paragraphs(text: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current_lines: Vec<&str> = Vec::new();

    for line in text.lines().chain(std::iter::once("")) {
        if line.trim().is_empty() {
            if !current_lines.is_empty() {
                let paragraph = normalize_paragraph(&current_lines.join(" "));
                if paragraph.len() > MIN_PARAGRAPH_CHARS {
                    paragraphs.push(paragraph);
                }
                current_lines.clear();
            }
        } else {
            current_lines.push(line);
        }
    }

    paragraphs
}

fn normalize_paragraph(raw: &str) -> String {
    let tokens: Vec<&str> = raw.split_whitespace().collect();
    let mut kept: Vec<&str> = Vec::with_capacity(tokens.len());

    let mut i = 0;
    while i < tokens.len() {
        let token = tokens[i];
        let next_is_number = tokens
            .get(i + 1)
            .is_some_and(|t| !t.is_empty() && t.chars().all(|c| c.is_ascii_digit()));

        if token.eq_ignore_ascii_case("page") && next_is_number {
            i += 2;
            continue;
        }

        kept.push(token);
        i += 1;
    }

    kept.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraph(words: usize, seed: &str) -> String {
        (0..words)
            .map(|i| format!("{seed}{i}"))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn short_text_yields_single_chunk() {
        let splitter = TextSplitter::new(300, 700, 50);
        let text = paragraph(100, "word");
        let chunks = splitter.split(&text);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].word_count, 100);
        assert_eq!(chunks[0].chunk_index, 0);
    }

    #[test]
    fn long_text_respects_max_window() {
        let splitter = TextSplitter::new(30, 80, 10);
        let text = (0..10)
            .map(|p| paragraph(40, &format!("p{p}w")))
            .collect::<Vec<_>>()
            .join("\n\n");

        let chunks = splitter.split(&text);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            // max window plus the carried overlap
            assert!(chunk.word_count <= 80 + 10 + 40);
        }
    }

    #[test]
    fn consecutive_chunks_share_overlap() {
        let splitter = TextSplitter::new(30, 80, 10);
        let text = (0..6)
            .map(|p| paragraph(50, &format!("p{p}w")))
            .collect::<Vec<_>>()
            .join("\n\n");

        let chunks = splitter.split(&text);
        assert!(chunks.len() >= 2);

        let first_words: Vec<&str> = chunks[0].text.split_whitespace().collect();
        let tail = first_words[first_words.len() - 10..].join(" ");
        assert!(chunks[1].text.starts_with(&tail));
    }

    #[test]
    fn page_markers_and_short_lines_are_dropped() {
        let text = format!(
            "{}\n\nPage 12\n\n{} Page 13 {}",
            paragraph(30, "alpha"),
            paragraph(20, "beta"),
            paragraph(20, "gamma")
        );
        let splitter = TextSplitter::new(10, 500, 0);
        let chunks = splitter.split(&text);

        let combined: String = chunks.iter().map(|c| c.text.as_str()).collect();
        assert!(!combined.contains("Page"));
    }
}
