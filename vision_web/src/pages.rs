use crate::task::Task;

pub const MEDIA_ROUTE: &str = "/media";

const ACCEPTED_EXTENSIONS: &str = ".jpg,.jpeg,.png";

pub fn index() -> String {
    layout(
        "Vision Demo",
        &format!(
            r#"<h1>Vision Demo</h1>
<p>Upload a photo and let a pre-trained model annotate it.</p>
<ul>
  <li><a href="{detection}">{detection_title}</a>: boxes and labels from DETR</li>
  <li><a href="{segmentation}">{segmentation_title}</a>: colored masks from Mask R-CNN</li>
</ul>"#,
            detection = Task::Detection.route(),
            detection_title = Task::Detection.title(),
            segmentation = Task::Segmentation.route(),
            segmentation_title = Task::Segmentation.title(),
        ),
    )
}

pub fn upload_form(task: Task) -> String {
    layout(
        task.title(),
        &format!(
            r#"<h1>{title}</h1>
<form method="post" action="{route}" enctype="multipart/form-data">
  <input type="file" name="image" accept="{accept}" required>
  <button type="submit">Upload</button>
</form>
<p><a href="/">Back</a></p>"#,
            title = task.title(),
            route = task.route(),
            accept = ACCEPTED_EXTENSIONS,
        ),
    )
}

pub fn result(task: Task, original: &str, processed: &str) -> String {
    layout(
        task.title(),
        &format!(
            r#"<h1>{title}</h1>
<div class="images">
  <figure><img src="{original_src}" alt="{original_alt}"><figcaption>Original</figcaption></figure>
  <figure><img src="{processed_src}" alt="{processed_alt}"><figcaption>Processed</figcaption></figure>
</div>
<p><a href="{route}">Try another image</a> | <a href="/">Home</a></p>"#,
            title = task.title(),
            original_src = media_url(original),
            original_alt = escape(original),
            processed_src = media_url(processed),
            processed_alt = escape(processed),
            route = task.route(),
        ),
    )
}

pub fn server_error() -> String {
    layout(
        "Server Error",
        "<h1>Server Error (500)</h1>\n<p>Something went wrong while processing the image.</p>",
    )
}

pub fn media_url(name: &str) -> String {
    format!("{}/{}", MEDIA_ROUTE, urlencoding::encode(name))
}

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n</head>\n<body>\n{}\n</body>\n</html>\n",
        escape(title),
        body
    )
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}
