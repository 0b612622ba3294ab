//! Format-specific text extractors.
//!
//! Each adapter turns the raw bytes of one file format into plain text
//! suitable for a prompt. The heavy lifting is delegated to format crates:
//! `htmd` for HTML, `pdf-extract` for PDF, `zip` + `quick-xml` for DOCX and
//! `calamine` for spreadsheets.

use crate::error::{FileError, Result};
use crate::kind::FileKind;
use calamine::Reader as _;
use quick_xml::events::Event;
use std::io::{Cursor, Read};
use tracing::debug;

/// Extracts the text of a file of the given kind.
///
/// Images yield an empty string; they are forwarded to the model as
/// attachments rather than read.
pub fn extract_text(name: &str, kind: FileKind, bytes: &[u8]) -> Result<String> {
    debug!(name, ?kind, size = bytes.len(), "Extracting text");

    match kind {
        kind if kind.is_textual() => Ok(decode_text(bytes)),
        FileKind::Html => extract_html(&decode_text(bytes)),
        FileKind::Pdf => extract_pdf(bytes),
        FileKind::Docx => extract_docx(bytes),
        FileKind::Spreadsheet => extract_spreadsheet(bytes),
        FileKind::Image => Ok(String::new()),
        _ => Err(FileError::Unsupported {
            name: name.to_string(),
            mime: crate::kind::mime_for_name(name).to_string(),
        }),
    }
}

/// Lossy UTF-8 decode with the byte order mark removed.
pub fn decode_text(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    text.strip_prefix('\u{feff}').unwrap_or(&text).to_string()
}

fn extract_html(html: &str) -> Result<String> {
    let converter = htmd::HtmlToMarkdown::builder()
        .skip_tags(vec!["script", "style", "nav", "iframe", "noscript", "svg"])
        .build();

    converter
        .convert(html)
        .map_err(|e| FileError::Html(e.to_string()))
}

fn extract_pdf(bytes: &[u8]) -> Result<String> {
    // pdf-extract panics on some malformed documents
    match std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes)) {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(FileError::Pdf(e.to_string())),
        Err(_) => Err(FileError::Pdf("parser aborted on malformed document".to_string())),
    }
}

fn extract_docx(bytes: &[u8]) -> Result<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")?
        .read_to_string(&mut xml)
        .map_err(|e| FileError::Docx(e.to_string()))?;

    docx_xml_to_text(&xml)
}

/// Flattens WordprocessingML into one line per paragraph.
pub(crate) fn docx_xml_to_text(xml: &str) -> Result<String> {
    let mut reader = quick_xml::Reader::from_str(xml);
    let mut out = String::new();
    let mut paragraph = String::new();
    let mut in_text = false;
    // Tab stops inside paragraph properties are layout, not content.
    let mut in_props = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.name().as_ref() {
                b"w:t" => in_text = true,
                b"w:pPr" => in_props = true,
                _ => {}
            },
            Event::End(e) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:pPr" => in_props = false,
                b"w:p" => {
                    out.push_str(paragraph.trim_end());
                    out.push('\n');
                    paragraph.clear();
                }
                _ => {}
            },
            Event::Empty(_) if in_props => {}
            Event::Empty(e) => match e.name().as_ref() {
                b"w:tab" => paragraph.push('\t'),
                b"w:br" | b"w:cr" => paragraph.push('\n'),
                b"w:p" => out.push('\n'),
                _ => {}
            },
            Event::Text(t) if in_text => {
                let text = t.unescape().map_err(|e| FileError::Docx(e.to_string()))?;
                paragraph.push_str(&text);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    out.push_str(&paragraph);
    Ok(out.trim_end().to_string())
}

fn extract_spreadsheet(bytes: &[u8]) -> Result<String> {
    let mut workbook = calamine::open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;
    let mut sections = Vec::new();

    for name in workbook.sheet_names() {
        let range = workbook.worksheet_range(&name)?;
        let rows: Vec<String> = range
            .rows()
            .map(|row| row.iter().map(|cell| cell.to_string()).collect::<Vec<_>>())
            .filter(|cells| cells.iter().any(|c| !c.trim().is_empty()))
            .map(|cells| format_row(&cells))
            .collect();

        sections.push(format!("## Sheet: {}\n{}", name, rows.join("\n")));
    }

    Ok(sections.join("\n\n"))
}

/// Joins cells into a CSV line, quoting cells that need it.
pub(crate) fn format_row(cells: &[String]) -> String {
    cells
        .iter()
        .map(|cell| {
            if cell.contains([',', '"', '\n']) {
                format!("\"{}\"", cell.replace('"', "\"\""))
            } else {
                cell.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn build_docx(document_xml: &str) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file(
                "word/document.xml",
                zip::write::SimpleFileOptions::default(),
            )
            .unwrap();
        writer.write_all(document_xml.as_bytes()).unwrap();
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_decode_text_strips_bom() {
        let bytes = b"\xEF\xBB\xBFhello";
        assert_eq!(decode_text(bytes), "hello");
    }

    #[test]
    fn test_decode_text_is_lossy() {
        let bytes = b"ok \xFF done";
        assert_eq!(decode_text(bytes), "ok \u{FFFD} done");
    }

    #[test]
    fn test_docx_paragraphs() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    <w:p><w:r><w:t>Quarterly</w:t></w:r><w:r><w:t xml:space="preserve"> report</w:t></w:r></w:p>
    <w:p><w:r><w:t>Revenue</w:t><w:tab/><w:t>&amp; costs</w:t></w:r></w:p>
    <w:p/>
    <w:p><w:r><w:t>Line one</w:t><w:br/><w:t>Line two</w:t></w:r></w:p>
  </w:body>
</w:document>"#;

        let text = docx_xml_to_text(xml).unwrap();
        assert_eq!(text, "Quarterly report\nRevenue\t& costs\n\nLine one\nLine two");
    }

    #[test]
    fn test_docx_ignores_paragraph_tab_stops() {
        let xml = r#"<w:document xmlns:w="x"><w:body>
<w:p><w:pPr><w:tabs><w:tab w:val="left" w:pos="720"/></w:tabs></w:pPr><w:r><w:t>Heading</w:t></w:r></w:p>
<w:p><w:pPr/><w:r><w:t>Name</w:t><w:tab/><w:t>Value</w:t></w:r></w:p>
</w:body></w:document>"#;

        let text = docx_xml_to_text(xml).unwrap();
        assert_eq!(text, "Heading\nName\tValue");
    }

    #[test]
    fn test_extract_docx_archive() {
        let bytes = build_docx(
            r#"<w:document xmlns:w="x"><w:body><w:p><w:r><w:t>Hello docx</w:t></w:r></w:p></w:body></w:document>"#,
        );
        let text = extract_text("a.docx", FileKind::Docx, &bytes).unwrap();
        assert_eq!(text, "Hello docx");
    }

    #[test]
    fn test_docx_without_document_part() {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("other.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"<x/>").unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let err = extract_text("a.docx", FileKind::Docx, &bytes).unwrap_err();
        assert!(matches!(err, FileError::Docx(_)));
    }

    #[test]
    fn test_garbage_is_an_error_not_a_panic() {
        let garbage = b"definitely not a zip or pdf";
        assert!(extract_text("a.docx", FileKind::Docx, garbage).is_err());
        assert!(extract_text("a.pdf", FileKind::Pdf, garbage).is_err());
        assert!(extract_text("a.xlsx", FileKind::Spreadsheet, garbage).is_err());
    }

    /// Builds a one-sheet workbook using inline strings, so no shared strings part.
    fn build_xlsx() -> Vec<u8> {
        let parts = [
            (
                "[Content_Types].xml",
                r#"<?xml version="1.0" encoding="UTF-8"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
<Default Extension="xml" ContentType="application/xml"/>
<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
<Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>
</Types>"#,
            ),
            (
                "_rels/.rels",
                r#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
</Relationships>"#,
            ),
            (
                "xl/workbook.xml",
                r#"<?xml version="1.0" encoding="UTF-8"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<sheets><sheet name="Budget" sheetId="1" r:id="rId1"/></sheets>
</workbook>"#,
            ),
            (
                "xl/_rels/workbook.xml.rels",
                r#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
</Relationships>"#,
            ),
            (
                "xl/worksheets/sheet1.xml",
                r#"<?xml version="1.0" encoding="UTF-8"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<sheetData>
<row r="1"><c r="A1" t="inlineStr"><is><t>Item</t></is></c><c r="B1" t="inlineStr"><is><t>Cost</t></is></c></row>
<row r="2"><c r="A2" t="inlineStr"><is><t>Rent, office</t></is></c><c r="B2"><v>1200</v></c></row>
</sheetData>
</worksheet>"#,
            ),
        ];

        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, body) in parts {
            writer
                .start_file(name, zip::write::SimpleFileOptions::default())
                .unwrap();
            writer.write_all(body.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_extract_spreadsheet() {
        let text = extract_text("budget.xlsx", FileKind::Spreadsheet, &build_xlsx()).unwrap();
        assert!(text.starts_with("## Sheet: Budget\n"), "{text}");
        assert!(text.contains("Item,Cost"));
        assert!(text.contains("\"Rent, office\",1200"));
    }

    /// A one-page PDF drawing `text` in Helvetica, with a correct xref table.
    fn build_pdf(text: &str) -> Vec<u8> {
        let stream = format!("BT /F1 24 Tf 72 720 Td ({}) Tj ET", text);
        let objects = [
            "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
            "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >>".to_string(),
            format!("<< /Length {} >>\nstream\n{}\nendstream", stream.len(), stream),
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>".to_string(),
        ];

        let mut pdf = String::from("%PDF-1.4\n");
        let mut offsets = Vec::new();
        for (i, body) in objects.iter().enumerate() {
            offsets.push(pdf.len());
            pdf.push_str(&format!("{} 0 obj\n{}\nendobj\n", i + 1, body));
        }

        let xref = pdf.len();
        pdf.push_str(&format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1));
        for offset in offsets {
            pdf.push_str(&format!("{:010} 00000 n \n", offset));
        }
        pdf.push_str(&format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref
        ));
        pdf.into_bytes()
    }

    #[test]
    fn test_extract_pdf() {
        let text = extract_text("hello.pdf", FileKind::Pdf, &build_pdf("Hello PDF")).unwrap();
        assert!(text.contains("Hello PDF"), "{text:?}");
    }

    #[test]
    fn test_html_to_markdown() {
        let html = "<html><head><style>p{}</style></head><body><h1>Title</h1><p>Body text</p><script>x()</script></body></html>";
        let text = extract_text("page.html", FileKind::Html, html.as_bytes()).unwrap();
        assert!(text.contains("# Title"));
        assert!(text.contains("Body text"));
        assert!(!text.contains("x()"));
    }

    #[test]
    fn test_image_has_no_text() {
        assert_eq!(extract_text("a.png", FileKind::Image, &[0x89, 0x50]).unwrap(), "");
    }

    #[test]
    fn test_unsupported() {
        let err = extract_text("blob.bin", FileKind::Unsupported, b"\0\0").unwrap_err();
        assert!(matches!(err, FileError::Unsupported { .. }));
    }

    #[test]
    fn test_format_row_quotes() {
        let cells = vec![
            "plain".to_string(),
            "a,b".to_string(),
            "say \"hi\"".to_string(),
            String::new(),
        ];
        assert_eq!(format_row(&cells), "plain,\"a,b\",\"say \"\"hi\"\"\",");
    }
}
