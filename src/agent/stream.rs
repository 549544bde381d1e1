/// Joins streamed fragments, trimming leading whitespace off the first one and
/// trailing whitespace off the last one. Everything in between is kept verbatim.
#[derive(Debug, Default)]
pub struct ChunkAssembler {
    text: String,
    last_start: usize,
    chunks: usize,
}

impl ChunkAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one fragment and returns the part that should be displayed.
    pub fn push(&mut self, content: &str, is_last: bool) -> &str {
        let mut piece = if self.chunks == 0 {
            content.trim_start()
        } else {
            content
        };
        if is_last {
            piece = piece.trim_end();
        }

        self.last_start = self.text.len();
        self.text.push_str(piece);
        self.chunks += 1;
        &self.text[self.last_start..]
    }

    /// The final fragment is trimmed here too, for streams that end without a
    /// `done` marker.
    pub fn finish(mut self) -> String {
        let keep = self.last_start + self.text[self.last_start..].trim_end().len();
        self.text.truncate(keep);
        self.text
    }
}

pub fn assemble_chunks<S: AsRef<str>>(chunks: &[S]) -> String {
    let mut assembler = ChunkAssembler::new();
    let last = chunks.len().saturating_sub(1);
    for (index, chunk) in chunks.iter().enumerate() {
        assembler.push(chunk.as_ref(), index == last);
    }
    assembler.finish()
}
