use std::{fs, path::Path};

use gemsite::{Config, Processor};
use pretty_assertions::assert_eq;
use tempfile::tempdir;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().expect("file has a parent")).expect("create parent dir");
    fs::write(path, content).expect("write fixture");
}

fn site(root: &Path) {
    write(
        root,
        "jekyll-files/_posts/2020-01-01-hello.md",
        "---\ntitle: Hello\npermalink: /hello\n---\nHello **world**\n",
    );
    write(
        root,
        "jekyll-files/_posts/2021-02-03-links.md",
        "---\ntitle: Links\n---\nSee [hello](/hello/), [a paper](/papers/p/), [old](/posts/gone/) and [me](/about).\n",
    );
    write(root, "jekyll-files/_posts/2019-12-31-empty.md", "");
    write(root, "jekyll-files/_posts/2019-12-30-broken.md", "---\ntitle: Broken\n---\n");
    write(root, "jekyll-files/_posts/notes.txt", "not markdown");
    write(
        root,
        "jekyll-files/_papers/2018-p.md",
        "---\ntitle: A Paper\npdf: /assets/pdf/p.pdf\n---\nThe *abstract*.\n",
    );
    write(root, "jekyll-files/_papers/2017-untitled.md", "No title here.");
    write(root, "jekyll-files/assets/pdf/p.pdf", "%PDF-1.4");
    write(
        root,
        "jekyll-files/_data/projects.yml",
        "- title: Capsule\n  description: This capsule.\n  url: /capsule/\n  github: https://github.com/m/capsule\n",
    );
    write(root, "gemini-templates/posts.gmi", "# Posts\n");
    write(root, "gemini-templates/papers.gmi", "# Papers\n");
    write(root, "gemini-templates/projects.gmi", "# Projects\n");
    write(root, "gemini-templates/index.gmi", "# Home\n=> posts/ Posts\n");
    write(
        root,
        "site.toml",
        r#"
[roots]
source = "jekyll-files"
templates = "gemini-templates"
output = "dist"

[site]
base-url = "gemini://example.org"

[[categories]]
name = "posts"

[[categories]]
name = "papers"
index = "aggregate"
write-files = false

[[lists]]
name = "projects"

[feed]
title = "Example posts"
author = "M"
"#,
    );
}

fn build(root: &Path, clean: bool) {
    let config_path = root.join("site.toml");
    let cfg = Config::from_file(&config_path)
        .expect("config parses")
        .resolve(root)
        .expect("config resolves");
    Processor::new(cfg).build_site(clean).expect("site builds");
}

fn read(root: &Path, rel: &str) -> String {
    fs::read_to_string(root.join(rel)).expect("output file exists")
}

#[test]
fn builds_posts_with_title_headings() {
    let dir = tempdir().expect("temp dir");
    site(dir.path());
    build(dir.path(), false);

    assert_eq!(read(dir.path(), "dist/posts/hello.gmi"), "# Hello\n\nHello world");
    assert!(!dir.path().join("dist/posts/2019-12-31-empty.gmi").exists());
    assert!(!dir.path().join("dist/posts/2019-12-30-broken.gmi").exists());
}

#[test]
fn posts_index_lists_newest_first() {
    let dir = tempdir().expect("temp dir");
    site(dir.path());
    build(dir.path(), false);

    assert_eq!(
        read(dir.path(), "dist/posts/index.gmi"),
        "# Posts\n\n\
         => gemini://example.org/posts/2021-02-03-links.gmi Links\n\
         => gemini://example.org/posts/hello.gmi Hello\n"
    );
}

#[test]
fn root_relative_links_are_rewritten() {
    let dir = tempdir().expect("temp dir");
    site(dir.path());
    build(dir.path(), false);

    let links = read(dir.path(), "dist/posts/2021-02-03-links.gmi");
    assert_eq!(
        links,
        "# Links\n\n\
         See hello[1], a paper[2], old[3] and me[4].\n\
         => gemini://example.org/posts/hello.gmi [1] hello\n\
         => /papers/p.pdf [2] a paper\n\
         => gemini://example.org/posts/ [3] old\n\
         => gemini://example.org/about [4] me"
    );
}

#[test]
fn papers_are_aggregated_with_attachments() {
    let dir = tempdir().expect("temp dir");
    site(dir.path());
    build(dir.path(), false);

    assert_eq!(
        read(dir.path(), "dist/papers/index.gmi"),
        "# Papers\n\n## A Paper\n\nThe abstract.\n\n=> p.pdf Paper\n"
    );
    assert_eq!(read(dir.path(), "dist/papers/p.pdf"), "%PDF-1.4");
    assert!(!dir.path().join("dist/papers/2018-p.gmi").exists());
}

#[test]
fn list_pages_and_static_pages() {
    let dir = tempdir().expect("temp dir");
    site(dir.path());
    build(dir.path(), false);

    assert_eq!(
        read(dir.path(), "dist/projects/index.gmi"),
        "# Projects\n\n## Capsule\nThis capsule.\n=> gemini://example.org/capsule/ Website\n=> https://github.com/m/capsule GitHub\n"
    );
    assert_eq!(read(dir.path(), "dist/index.gmi"), "# Home\n=> posts/ Posts\n");
}

#[test]
fn feed_covers_written_posts() {
    let dir = tempdir().expect("temp dir");
    site(dir.path());
    build(dir.path(), false);

    let xml = read(dir.path(), "dist/posts/atom.xml");
    assert!(xml.contains("<title>Example posts</title>"));
    assert!(xml.contains("<link href=\"gemini://example.org/posts/atom.xml\" rel=\"self\"/>"));
    assert!(xml.contains("<id>gemini://example.org/posts/2021-02-03-links.gmi</id>"));
    assert!(xml.contains("<title>Hello</title>"));
    assert!(xml.contains("<updated>2021-02-03T00:00:00Z</updated>"));
    assert!(!xml.contains("index.gmi"));
    assert_eq!(xml.matches("<entry>").count(), 2);
}

#[test]
fn feed_orders_permalinked_posts_by_source_date() {
    let dir = tempdir().expect("temp dir");
    site(dir.path());
    write(
        dir.path(),
        "jekyll-files/_posts/2019-06-01-old.md",
        "---\ntitle: Old\npermalink: /old/\n---\nOld news\n",
    );
    build(dir.path(), false);

    let xml = read(dir.path(), "dist/posts/atom.xml");
    let at = |title: &str| {
        xml.find(&format!("<title>{}</title>", title))
            .expect("entry in feed")
    };
    assert!(at("Links") < at("Hello"));
    assert!(at("Hello") < at("Old"));
    assert!(xml.contains("<updated>2019-06-01T00:00:00Z</updated>"));
}

#[test]
fn spaced_file_names_are_linked_encoded() {
    let dir = tempdir().expect("temp dir");
    site(dir.path());
    write(
        dir.path(),
        "jekyll-files/_posts/my post.md",
        "---\ntitle: Spaced\n---\nHi\n",
    );
    build(dir.path(), false);

    assert_eq!(read(dir.path(), "dist/posts/my post.gmi"), "# Spaced\n\nHi");
    assert!(read(dir.path(), "dist/posts/index.gmi")
        .contains("=> gemini://example.org/posts/my%20post.gmi Spaced\n"));
    assert!(read(dir.path(), "dist/posts/atom.xml")
        .contains("<id>gemini://example.org/posts/my%20post.gmi</id>"));
}

#[test]
fn colliding_permalinks_fail_the_build() {
    let dir = tempdir().expect("temp dir");
    site(dir.path());
    write(
        dir.path(),
        "jekyll-files/_posts/2020-05-05-intro.md",
        "---\ntitle: A\npermalink: /2020/intro/\n---\nfirst post\n",
    );
    write(
        dir.path(),
        "jekyll-files/_posts/2021-05-05-intro.md",
        "---\ntitle: B\npermalink: /2021/intro/\n---\nsecond post\n",
    );

    let cfg = Config::from_file(&dir.path().join("site.toml"))
        .expect("config parses")
        .resolve(dir.path())
        .expect("config resolves");
    let err = Processor::new(cfg)
        .build_site(false)
        .expect_err("two posts share intro.gmi");
    assert!(format!("{:#}", err).contains("intro.gmi"));
}

#[test]
fn clean_removes_stale_output() {
    let dir = tempdir().expect("temp dir");
    site(dir.path());
    write(dir.path(), "dist/posts/stale.gmi", "# Stale");

    build(dir.path(), false);
    assert!(dir.path().join("dist/posts/stale.gmi").exists());

    build(dir.path(), true);
    assert!(!dir.path().join("dist/posts/stale.gmi").exists());
    assert!(dir.path().join("dist/posts/hello.gmi").exists());
}

#[test]
fn missing_category_folder_fails() {
    let dir = tempdir().expect("temp dir");
    site(dir.path());
    fs::remove_dir_all(dir.path().join("jekyll-files/_papers")).expect("remove papers");

    let cfg = Config::from_file(&dir.path().join("site.toml"))
        .expect("config parses")
        .resolve(dir.path())
        .expect("config resolves");
    assert!(Processor::new(cfg).build_site(false).is_err());
}
