//! Authoring helpers: tags, read time, draft validation, markdown preview,
//! comment threading and profile statistics.

use crate::error::ClientError;
use crate::models::{Comment, Post, PostInput, PostUpdate};
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

pub const MAX_TAGS: usize = 10;
pub const MAX_TAG_LEN: usize = 30;
pub const WORDS_PER_MINUTE: usize = 200;

// ==================== Теги ====================

/// Ordered, duplicate-free tag list of at most [`MAX_TAGS`] entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagList {
    tags: Vec<String>,
}

impl TagList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Splits on `,` and `;` and adds every piece in order.
    pub fn parse(input: &str) -> Result<Self, ClientError> {
        let mut list = Self::new();
        for piece in input.split([',', ';']) {
            list.add(piece)?;
        }
        Ok(list)
    }

    /// Adds a trimmed tag. Blank input and duplicates are ignored
    /// (`Ok(false)`); a full list or an overlong tag is an error.
    pub fn add(&mut self, raw: &str) -> Result<bool, ClientError> {
        let tag = raw.trim();
        if tag.is_empty() || self.contains(tag) {
            return Ok(false);
        }
        if tag.chars().count() > MAX_TAG_LEN {
            return Err(ClientError::InvalidInput(format!(
                "tag {tag:?} is longer than {MAX_TAG_LEN} characters"
            )));
        }
        if self.is_full() {
            return Err(ClientError::InvalidInput(format!(
                "a post can have at most {MAX_TAGS} tags"
            )));
        }
        self.tags.push(tag.to_string());
        Ok(true)
    }

    pub fn remove(&mut self, tag: &str) -> bool {
        let before = self.tags.len();
        self.tags.retain(|t| t != tag);
        self.tags.len() != before
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub fn is_full(&self) -> bool {
        self.tags.len() >= MAX_TAGS
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.tags
    }

    pub fn into_vec(self) -> Vec<String> {
        self.tags
    }
}

impl TryFrom<Vec<String>> for TagList {
    type Error = ClientError;

    fn try_from(tags: Vec<String>) -> Result<Self, Self::Error> {
        let mut list = Self::new();
        for tag in &tags {
            list.add(tag)?;
        }
        Ok(list)
    }
}

// ==================== Время чтения ====================

/// Minutes to read `content` at [`WORDS_PER_MINUTE`], never less than one.
pub fn estimate_read_time(content: &str) -> u32 {
    let words = content.split(' ').count();
    let minutes = words.div_ceil(WORDS_PER_MINUTE).max(1);
    u32::try_from(minutes).unwrap_or(u32::MAX)
}

// ==================== Черновик поста ====================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostDraft {
    pub title: String,
    pub excerpt: String,
    pub content: String,
    pub image: Option<String>,
    pub tags: TagList,
}

impl PostDraft {
    /// Prefills a draft for editing an existing post.
    pub fn from_post(post: &Post) -> Result<Self, ClientError> {
        Ok(Self {
            title: post.title.clone(),
            excerpt: post.excerpt.clone(),
            content: post.content.clone(),
            image: post.image.clone(),
            tags: TagList::try_from(post.tags.clone())?,
        })
    }

    pub fn read_time(&self) -> u32 {
        estimate_read_time(&self.content)
    }

    pub fn into_input(self, author_id: impl Into<String>) -> Result<PostInput, ClientError> {
        let read_time = self.read_time();
        let input = PostInput {
            title: self.title.trim().to_string(),
            excerpt: self.excerpt.trim().to_string(),
            content: self.content,
            tags: self.tags.into_vec(),
            image: self
                .image
                .map(|i| i.trim().to_string())
                .filter(|i| !i.is_empty()),
            author: author_id.into(),
            read_time,
        };
        input.validate()?;
        Ok(input)
    }
}

impl PostInput {
    pub fn validate(&self) -> Result<(), ClientError> {
        require_text("title", &self.title)?;
        require_text("excerpt", &self.excerpt)?;
        require_text("content", &self.content)?;
        require_text("author", &self.author)?;

        validate_tags(&self.tags)?;
        if let Some(image) = &self.image {
            validate_image(image)?;
        }

        Ok(())
    }
}

impl PostUpdate {
    /// Same rules as [`PostInput::validate`], applied to the fields present.
    pub fn validate(&self) -> Result<(), ClientError> {
        for (field, value) in [
            ("title", &self.title),
            ("excerpt", &self.excerpt),
            ("content", &self.content),
        ] {
            if let Some(value) = value {
                require_text(field, value)?;
            }
        }
        if let Some(tags) = &self.tags {
            validate_tags(tags)?;
        }
        if let Some(image) = &self.image {
            validate_image(image)?;
        }

        Ok(())
    }
}

fn validate_tags(tags: &[String]) -> Result<(), ClientError> {
    if tags.len() > MAX_TAGS {
        return Err(ClientError::InvalidInput(format!(
            "a post can have at most {MAX_TAGS} tags"
        )));
    }
    let mut seen = HashSet::new();
    for tag in tags {
        let trimmed = tag.trim();
        if trimmed.is_empty() || trimmed.chars().count() > MAX_TAG_LEN {
            return Err(ClientError::InvalidInput(format!("invalid tag {tag:?}")));
        }
        if !seen.insert(trimmed) {
            return Err(ClientError::InvalidInput(format!("duplicate tag {tag:?}")));
        }
    }
    Ok(())
}

fn validate_image(image: &str) -> Result<(), ClientError> {
    if image.starts_with("http://") || image.starts_with("https://") {
        Ok(())
    } else {
        Err(ClientError::InvalidInput(format!(
            "image must be an http(s) URL, got {image:?}"
        )))
    }
}

fn require_text(field: &str, value: &str) -> Result<(), ClientError> {
    if value.trim().is_empty() {
        Err(ClientError::InvalidInput(format!("{field} must not be empty")))
    } else {
        Ok(())
    }
}

// ==================== Markdown ====================

struct InlineRules {
    code: Regex,
    strong: Regex,
    em: Regex,
}

fn inline_rules() -> &'static InlineRules {
    static RULES: OnceLock<InlineRules> = OnceLock::new();
    RULES.get_or_init(|| InlineRules {
        code: Regex::new(r"`([^`]+?)`").expect("valid code pattern"),
        strong: Regex::new(r"\*\*(.+?)\*\*").expect("valid strong pattern"),
        em: Regex::new(r"\*(.+?)\*").expect("valid em pattern"),
    })
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn render_inline(line: &str) -> String {
    let rules = inline_rules();
    let line = rules.code.replace_all(line, "<code>$1</code>");
    let line = rules.strong.replace_all(&line, "<strong>$1</strong>");
    rules.em.replace_all(&line, "<em>$1</em>").into_owned()
}

fn heading(line: &str) -> Option<(u8, &str)> {
    [("### ", 3), ("## ", 2), ("# ", 1)]
        .into_iter()
        .find_map(|(prefix, level)| line.strip_prefix(prefix).map(|rest| (level, rest)))
}

/// Lightweight preview: headings, bold, italics, inline code, paragraphs
/// and line breaks. Input is HTML-escaped first.
pub fn render_markdown(content: &str) -> String {
    let normalized = content.replace("\r\n", "\n");
    let escaped = escape_html(&normalized);
    let mut html = String::new();

    for block in escaped.split("\n\n") {
        let mut paragraph: Vec<String> = Vec::new();

        for line in block.lines() {
            if let Some((level, text)) = heading(line) {
                flush_paragraph(&mut html, &mut paragraph);
                html.push_str(&format!("<h{level}>{}</h{level}>", render_inline(text)));
            } else {
                paragraph.push(render_inline(line));
            }
        }
        flush_paragraph(&mut html, &mut paragraph);
    }

    html
}

fn flush_paragraph(html: &mut String, lines: &mut Vec<String>) {
    if lines.iter().all(|l| l.trim().is_empty()) {
        lines.clear();
        return;
    }
    html.push_str("<p>");
    html.push_str(&lines.join("<br>"));
    html.push_str("</p>");
    lines.clear();
}

// ==================== Комментарии ====================

/// Moves replies under their top-level parent. Replies whose parent is
/// not a top-level comment in `comments` stay at the top level.
pub fn thread_comments(comments: Vec<Comment>) -> Vec<Comment> {
    let top_level: HashSet<String> = comments
        .iter()
        .filter(|c| c.parent_id.is_none())
        .map(|c| c.id.clone())
        .collect();

    let mut roots = Vec::new();
    let mut replies: HashMap<String, Vec<Comment>> = HashMap::new();

    for comment in comments {
        match &comment.parent_id {
            Some(parent) if top_level.contains(parent) => {
                replies.entry(parent.clone()).or_default().push(comment)
            }
            _ => roots.push(comment),
        }
    }

    for root in &mut roots {
        if let Some(children) = replies.remove(&root.id) {
            root.replies.extend(children);
        }
    }

    roots
}

// ==================== Статистика профиля ====================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProfileStats {
    pub articles: usize,
    pub total_likes: u64,
}

impl ProfileStats {
    pub fn from_posts(posts: &[Post]) -> Self {
        Self {
            articles: posts.len(),
            total_likes: posts.iter().map(|p| p.likes).sum(),
        }
    }
}
