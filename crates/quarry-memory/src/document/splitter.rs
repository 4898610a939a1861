use super::types::Document;

/// Separators tried in order, coarsest first. The empty string splits into single characters.
pub const DEFAULT_SEPARATORS: &[&str] = &["\n\n\n", "\n\n", "\n", ".", " ", ""];

/// Turns documents into smaller documents. Implementations must be deterministic.
pub trait Splitter: Send + Sync {
    fn split_documents(&self, documents: &[Document]) -> Vec<Document>;
}

/// Sizes are measured in characters.
#[derive(Debug, Clone)]
pub struct SplitterConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub separators: Vec<String>,
}

impl SplitterConfig {
    #[must_use]
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
            ..Self::default()
        }
    }
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            separators: DEFAULT_SEPARATORS.iter().map(|s| (*s).to_owned()).collect(),
        }
    }
}

/// Recursive character splitter.
///
/// Text is cut on the first separator present in it, pieces that are still too long are cut
/// again on the next separator, and neighbouring pieces are merged back into chunks of at
/// most `chunk_size` characters sharing up to `chunk_overlap` characters with the previous
/// chunk. Every chunk is trimmed and is a contiguous slice of the input.
///
/// Each output document keeps the metadata of its source and adds `chunk_index` and
/// `start_index` (character offset in the source content).
#[derive(Debug, Clone)]
pub struct TextSplitter {
    config: SplitterConfig,
}

impl Default for TextSplitter {
    fn default() -> Self {
        Self::new(SplitterConfig::default())
    }
}

impl TextSplitter {
    #[must_use]
    pub fn new(config: SplitterConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &SplitterConfig {
        &self.config
    }

    #[must_use]
    pub fn split_text(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        let chunk_size = self.config.chunk_size.max(1);
        let mut separators: Vec<&str> = self.config.separators.iter().map(String::as_str).collect();
        if separators.last() != Some(&"") {
            separators.push("");
        }

        let mut raw = Vec::new();
        split_recursive(text, &separators, chunk_size, self.config.chunk_overlap, &mut raw);

        raw.into_iter()
            .map(|chunk| chunk.trim().to_owned())
            .filter(|chunk| !chunk.is_empty())
            .collect()
    }
}

impl Splitter for TextSplitter {
    fn split_documents(&self, documents: &[Document]) -> Vec<Document> {
        let mut out = Vec::new();
        for document in documents {
            let text = &document.content;
            let mut search_from = 0;
            for (i, chunk) in self.split_text(text).into_iter().enumerate() {
                let byte_start = text[search_from..]
                    .find(&chunk)
                    .map_or(search_from, |pos| search_from + pos);
                let start_index = text[..byte_start].chars().count();
                search_from = byte_start;

                let mut metadata = document.metadata.clone();
                metadata.insert("chunk_index".into(), i.into());
                metadata.insert("start_index".into(), start_index.into());
                out.push(Document {
                    content: chunk,
                    metadata,
                });
            }
        }
        out
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn split_recursive<'a>(
    text: &'a str,
    separators: &[&str],
    chunk_size: usize,
    chunk_overlap: usize,
    out: &mut Vec<String>,
) {
    let (position, separator) = separators
        .iter()
        .enumerate()
        .find(|(_, sep)| sep.is_empty() || text.contains(**sep))
        .map_or((separators.len(), ""), |(i, sep)| (i, *sep));
    let finer = separators.get(position + 1..).unwrap_or(&[]);

    let pieces: Vec<&'a str> = if separator.is_empty() {
        text.char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect()
    } else {
        text.split_inclusive(separator).collect()
    };

    let mut fitting: Vec<&str> = Vec::new();
    for piece in pieces {
        if char_len(piece) <= chunk_size {
            fitting.push(piece);
            continue;
        }
        if !fitting.is_empty() {
            out.extend(merge_pieces(&fitting, chunk_size, chunk_overlap));
            fitting.clear();
        }
        split_recursive(piece, finer, chunk_size, chunk_overlap, out);
    }
    if !fitting.is_empty() {
        out.extend(merge_pieces(&fitting, chunk_size, chunk_overlap));
    }
}

/// Merge pieces into chunks, respecting size and overlap.
///
/// Every piece must already fit in `chunk_size`.
fn merge_pieces(pieces: &[&str], chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;
    // Sliding window: track only the piece indices contributing to the current chunk.
    let mut window_start = 0;

    for (idx, piece) in pieces.iter().enumerate() {
        let piece_len = char_len(piece);
        if current_len > 0 && current_len + piece_len > chunk_size {
            chunks.push(std::mem::take(&mut current));

            // Overlap is shrunk so that it plus the next piece still fits.
            let budget = chunk_overlap.min(chunk_size - piece_len);
            let mut overlap_len = 0;
            let mut overlap_start = idx;
            for i in (window_start..idx).rev() {
                let len = char_len(pieces[i]);
                if overlap_len + len > budget {
                    break;
                }
                overlap_len += len;
                overlap_start = i;
            }
            for p in &pieces[overlap_start..idx] {
                current.push_str(p);
            }
            current_len = overlap_len;
            window_start = overlap_start;
        }

        current.push_str(piece);
        current_len += piece_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}
