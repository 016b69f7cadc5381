//! Streaming record walker.
//!
//! Pull-parses a byte stream with `quick_xml` and materializes one record
//! subtree at a time. Outside a record only the names of the open ancestor
//! elements are kept, so peak memory is one record plus the ancestor chain,
//! independent of how many records the container holds.

use crate::error::WalkError;
use crate::xml::{Element, TreeBuilder};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::io::BufRead;

const READ_BUFFER_CAPACITY: usize = 8 * 1024;

/// Counters for one walk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalkStats {
    /// Records delivered.
    pub records: u64,
    /// Largest number of elements held at once (record subtree + ancestors).
    pub peak_live_elements: usize,
    /// Bytes consumed from the (decompressed) stream.
    pub bytes_read: u64,
}

/// Pull-based walker yielding every element named `record_tag`, in document
/// order.
pub struct RecordWalker<R: BufRead> {
    reader: Reader<R>,
    /// `None` yields the first top-level element.
    record_tag: Option<Vec<u8>>,
    buf: Vec<u8>,
    ancestors: Vec<String>,
    stats: WalkStats,
    finished: bool,
}

impl<R: BufRead> RecordWalker<R> {
    pub fn new(input: R, record_tag: &str) -> Self {
        Self::with_tag(input, Some(record_tag.as_bytes().to_vec()))
    }

    fn with_tag(input: R, record_tag: Option<Vec<u8>>) -> Self {
        let mut reader = Reader::from_reader(input);
        reader.expand_empty_elements(true);
        reader.check_end_names(true);
        reader.trim_text(false);

        Self {
            reader,
            record_tag,
            buf: Vec::with_capacity(READ_BUFFER_CAPACITY),
            ancestors: Vec::new(),
            stats: WalkStats::default(),
            finished: false,
        }
    }

    pub fn stats(&self) -> &WalkStats {
        &self.stats
    }

    /// Next record element, `Ok(None)` at a clean end of input.
    ///
    /// The previous record is owned by the caller and is released when it is
    /// dropped; the walker keeps no reference to it.
    pub fn next_record(&mut self) -> Result<Option<Element>, WalkError> {
        if self.finished {
            return Ok(None);
        }

        let mut builder = TreeBuilder::default();
        loop {
            self.buf.clear();
            let event = match self.reader.read_event_into(&mut self.buf) {
                Ok(event) => event,
                Err(err) => {
                    self.finished = true;
                    return Err(WalkError::corrupt(
                        self.reader.buffer_position() as u64,
                        err.to_string(),
                    ));
                }
            };
            self.stats.bytes_read = self.reader.buffer_position() as u64;

            match event {
                Event::Start(ref start) => {
                    let is_record = builder.is_building()
                        || match &self.record_tag {
                            Some(tag) => start.name().as_ref() == tag.as_slice(),
                            None => self.ancestors.is_empty(),
                        };
                    if is_record {
                        let element = match element_from_start(start) {
                            Ok(element) => element,
                            Err(msg) => {
                                self.finished = true;
                                return Err(WalkError::corrupt(self.stats.bytes_read, msg));
                            }
                        };
                        builder.open(element);
                        let live = builder.live_elements() + self.ancestors.len();
                        self.stats.peak_live_elements = self.stats.peak_live_elements.max(live);
                    } else {
                        self.ancestors
                            .push(String::from_utf8_lossy(start.name().as_ref()).into_owned());
                    }
                }
                Event::End(_) => {
                    if builder.is_building() {
                        if let Some(record) = builder.close() {
                            self.stats.records += 1;
                            return Ok(Some(record));
                        }
                    } else {
                        self.ancestors.pop();
                    }
                }
                Event::Text(ref text) if builder.is_building() => match text.unescape() {
                    Ok(unescaped) => builder.text(&unescaped),
                    Err(err) => {
                        tracing::debug!(error = %err, "Keeping undecodable text run verbatim");
                        builder.text(&String::from_utf8_lossy(text));
                    }
                },
                Event::CData(ref cdata) if builder.is_building() => {
                    builder.text(&String::from_utf8_lossy(cdata));
                }
                Event::Eof => {
                    self.finished = true;
                    if builder.is_building() || !self.ancestors.is_empty() {
                        let inside = self
                            .ancestors
                            .last()
                            .map(|name| format!(" inside <{}>", name))
                            .unwrap_or_default();
                        return Err(WalkError::corrupt(
                            self.stats.bytes_read,
                            format!("unexpected end of input{}", inside),
                        ));
                    }
                    return Ok(None);
                }
                // Declarations, comments, processing instructions, doctype and
                // text between records carry no record content.
                _ => {}
            }
        }
    }
}

/// Walk `input`, invoking `on_record` once per record element in document
/// order. The element is only borrowed for the duration of the call.
///
/// Records delivered before a [`WalkError::CorruptInput`] have already been
/// handed to `on_record` and stay processed.
pub fn walk<R, F>(input: R, record_tag: &str, mut on_record: F) -> Result<WalkStats, WalkError>
where
    R: BufRead,
    F: FnMut(&Element),
{
    let mut walker = RecordWalker::new(input, record_tag);
    while let Some(record) = walker.next_record()? {
        on_record(&record);
    }
    Ok(walker.stats().clone())
}

/// Parse the first top-level element of `input` into a tree.
pub(crate) fn parse_element<R: BufRead>(input: R) -> Result<Element, WalkError> {
    let mut walker = RecordWalker::with_tag(input, None);
    walker
        .next_record()?
        .ok_or_else(|| WalkError::corrupt(0, "no root element"))
}

fn element_from_start(start: &BytesStart<'_>) -> Result<Element, String> {
    let mut element = Element::new(String::from_utf8_lossy(start.name().as_ref()).into_owned());
    for attr in start.attributes() {
        let attr = attr.map_err(|err| err.to_string())?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = match attr.unescape_value() {
            Ok(value) => value.into_owned(),
            Err(err) => {
                tracing::debug!(attribute = %key, error = %err, "Keeping undecodable attribute verbatim");
                String::from_utf8_lossy(&attr.value).into_owned()
            }
        };
        element.set_attribute(key, value);
    }
    Ok(element)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn container(records: usize) -> String {
        let mut xml = String::from("<?xml version=\"1.0\"?>\n<PubmedArticleSet>\n");
        for i in 0..records {
            xml.push_str(&format!(
                "  <PubmedArticle><MedlineCitation><PMID Version=\"1\">{}</PMID>\
                 <Article><ArticleTitle>Title {}</ArticleTitle></Article>\
                 </MedlineCitation></PubmedArticle>\n",
                i + 1,
                i + 1
            ));
        }
        xml.push_str("</PubmedArticleSet>\n");
        xml
    }

    fn pmids(xml: &str) -> Result<Vec<String>, WalkError> {
        let mut seen = Vec::new();
        walk(xml.as_bytes(), "PubmedArticle", |record| {
            seen.push(crate::xml::resolve(record, "MedlineCitation/PMID")[0].joined_text());
        })?;
        Ok(seen)
    }

    #[test]
    fn test_walk_yields_records_in_document_order() {
        assert_eq!(pmids(&container(3)).unwrap(), vec!["1", "2", "3"]);
    }

    #[test]
    fn test_walk_ignores_non_record_siblings() {
        let xml = "<Set><DeleteCitation><PMID>9</PMID></DeleteCitation>\
                   <PubmedArticle><MedlineCitation><PMID>1</PMID></MedlineCitation></PubmedArticle>\
                   <!-- comment --></Set>";
        assert_eq!(pmids(xml).unwrap(), vec!["1"]);
    }

    #[test]
    fn test_empty_container_yields_nothing() {
        assert!(pmids("<PubmedArticleSet/>").unwrap().is_empty());
        assert!(pmids("").unwrap().is_empty());
    }

    #[test]
    fn test_truncated_input_keeps_delivered_records() {
        let full = container(3);
        let cut = full.find("<PubmedArticle><MedlineCitation><PMID Version=\"1\">3").unwrap() + 30;
        let truncated = &full[..cut];

        let mut seen = Vec::new();
        let result = walk(truncated.as_bytes(), "PubmedArticle", |record| {
            seen.push(record.joined_text());
        });

        assert_eq!(seen.len(), 2);
        assert!(matches!(result, Err(WalkError::CorruptInput { .. })));
    }

    #[test]
    fn test_mismatched_end_tag_is_corrupt() {
        let xml = "<Set><PubmedArticle><A></B></PubmedArticle></Set>";
        let err = pmids(xml).unwrap_err();
        assert!(matches!(err, WalkError::CorruptInput { .. }));
    }

    #[test]
    fn test_walker_stops_after_error() {
        let mut walker = RecordWalker::new("<Set><PubmedArticle>".as_bytes(), "PubmedArticle");
        assert!(walker.next_record().is_err());
        assert_eq!(walker.next_record().unwrap(), None);
    }

    #[test]
    fn test_peak_live_elements_independent_of_record_count() {
        let small_xml = container(5);
        let mut small = RecordWalker::new(small_xml.as_bytes(), "PubmedArticle");
        while small.next_record().unwrap().is_some() {}

        let big_xml = container(2_000);
        let mut big = RecordWalker::new(big_xml.as_bytes(), "PubmedArticle");
        while big.next_record().unwrap().is_some() {}

        assert_eq!(small.stats().records, 5);
        assert_eq!(big.stats().records, 2_000);
        // record (5 elements) + <PubmedArticleSet>
        assert_eq!(small.stats().peak_live_elements, 6);
        assert_eq!(big.stats().peak_live_elements, small.stats().peak_live_elements);
    }

    #[test]
    fn test_entities_cdata_and_attributes_decoded() {
        let xml = "<Set><PubmedArticle><T a=\"x &amp; y\">A &lt; B <![CDATA[<raw>]]></T></PubmedArticle></Set>";
        let mut walker = RecordWalker::new(xml.as_bytes(), "PubmedArticle");
        let record = walker.next_record().unwrap().unwrap();
        let t = crate::xml::resolve(&record, "T")[0];
        assert_eq!(t.attribute("a"), Some("x & y"));
        assert_eq!(t.joined_text(), "A < B <raw>");
    }

    #[test]
    fn test_unknown_entities_kept_verbatim() {
        let xml = "<Set><PubmedArticle><T a=\"&alpha;-1\">&beta; cells</T></PubmedArticle>\
                   <PubmedArticle><T>next</T></PubmedArticle></Set>";
        let mut walker = RecordWalker::new(xml.as_bytes(), "PubmedArticle");
        let record = walker.next_record().unwrap().unwrap();
        let t = crate::xml::resolve(&record, "T")[0];
        assert_eq!(t.attribute("a"), Some("&alpha;-1"));
        assert_eq!(t.joined_text(), "&beta; cells");

        let next = walker.next_record().unwrap().unwrap();
        assert_eq!(crate::xml::resolve(&next, "T")[0].joined_text(), "next");
        assert_eq!(walker.next_record().unwrap(), None);
    }

    #[test]
    fn test_self_closing_record() {
        let mut walker = RecordWalker::new("<Set><PubmedArticle/></Set>".as_bytes(), "PubmedArticle");
        let record = walker.next_record().unwrap().unwrap();
        assert_eq!(record.element_count(), 1);
        assert_eq!(walker.next_record().unwrap(), None);
    }

    #[test]
    fn test_parse_element_fragment() {
        let el = Element::parse("<div>Text <em>inside</em> tag</div>").unwrap();
        assert_eq!(el.name(), "div");
        assert_eq!(el.joined_text(), "Text inside tag");
        assert!(Element::parse("   ").is_err());
    }
}
