use anyhow::{Context, Result, anyhow};
use std::collections::BTreeMap;
use tera::{Context as TeraContext, Tera};

include!(concat!(env!("OUT_DIR"), "/embedded_prompt_templates.rs"));

#[derive(Debug, Clone, Copy)]
pub struct PromptTemplate {
    pub name: &'static str,
    pub label: &'static str,
    pub description: &'static str,
    pub category: &'static str,
    pub variables: &'static [&'static str],
}

pub const TEMPLATES: &[PromptTemplate] = &[
    PromptTemplate {
        name: "study_notes",
        label: "测试笔记",
        description: "生成学习测试的笔记内容",
        category: "学习",
        variables: &["topic"],
    },
    PromptTemplate {
        name: "reading_notes",
        label: "读书笔记",
        description: "生成书籍章节的读书笔记",
        category: "学习",
        variables: &["book_title", "chapter"],
    },
    PromptTemplate {
        name: "work_report",
        label: "工作汇报",
        description: "生成工作进展汇报",
        category: "工作",
        variables: &["project_name"],
    },
    PromptTemplate {
        name: "meeting_minutes",
        label: "会议记录",
        description: "生成会议记录",
        category: "工作",
        variables: &["meeting_topic", "meeting_date", "attendees"],
    },
    PromptTemplate {
        name: "diary",
        label: "日记模板",
        description: "生成日记内容",
        category: "个人",
        variables: &["date"],
    },
];

pub fn find(name: &str) -> Option<&'static PromptTemplate> {
    let needle = name.trim();
    TEMPLATES
        .iter()
        .find(|template| template.name.eq_ignore_ascii_case(needle) || template.label == needle)
}

pub fn categories() -> Vec<&'static str> {
    let mut seen = Vec::new();
    for template in TEMPLATES {
        if !seen.contains(&template.category) {
            seen.push(template.category);
        }
    }
    seen
}

pub fn in_category(category: &str) -> impl Iterator<Item = &'static PromptTemplate> + '_ {
    TEMPLATES
        .iter()
        .filter(move |template| template.category == category)
}

pub fn render(name: &str, vars: &BTreeMap<String, String>) -> Result<String> {
    let template = find(name).ok_or_else(|| {
        let known: Vec<&str> = TEMPLATES.iter().map(|template| template.name).collect();
        anyhow!(
            "unknown prompt template '{}' (expected one of: {})",
            name,
            known.join(", ")
        )
    })?;
    let source = embedded_prompt_template(template.name)
        .ok_or_else(|| anyhow!("prompt template '{}' is not embedded", template.name))?;

    let missing: Vec<&str> = template
        .variables
        .iter()
        .copied()
        .filter(|var| !vars.contains_key(*var))
        .collect();
    if !missing.is_empty() {
        return Err(anyhow!(
            "prompt template '{}' needs: {}",
            template.name,
            missing.join(", ")
        ));
    }

    let mut context = TeraContext::new();
    for (key, value) in vars {
        context.insert(key.as_str(), value.as_str());
    }
    Tera::one_off(source, &context, false)
        .map(|rendered| rendered.trim_end().to_string())
        .with_context(|| format!("failed to render prompt template '{}'", template.name))
}

pub fn render_placeholder(name: &str) -> Result<String> {
    let template = find(name).ok_or_else(|| anyhow!("unknown prompt template '{}'", name))?;
    let vars = template
        .variables
        .iter()
        .map(|var| (var.to_string(), format!("[{}]", var)))
        .collect();
    render(template.name, &vars)
}
