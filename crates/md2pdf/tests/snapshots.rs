use insta::assert_snapshot;
use md2pdf::document::print_layer;
use md2pdf::{HtmlDocument, PageOptions};

#[test]
fn test_snapshots_document_with_header() {
    let doc = HtmlDocument::assemble(
        "Notes",
        "body { margin: 0; }",
        Some("<div class=\"header\">ACME</div>"),
        "<h1 id=\"notes\">Notes</h1>\n",
    );

    assert_snapshot!(doc.as_str(), @r#"
<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>Notes</title>
<style>
body { margin: 0; }
</style>
</head>
<body>
<div class="header">ACME</div>
<div class="content has-header">
<h1 id="notes">Notes</h1>
</div>
</body>
</html>
"#);
}

#[test]
fn test_snapshots_print_layer() {
    let page = PageOptions {
        size: "Letter".to_string(),
        margin: "1in".to_string(),
    };
    let css = print_layer(&page, &["", ".x { color: red; }\n\n"]);

    assert_snapshot!(css, @r#"
@page {
  size: Letter;
  margin: 1in;
}

.x { color: red; }
"#);
}
