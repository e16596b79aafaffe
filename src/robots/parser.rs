//! Robots.txt parser implementation
//!
//! URL matching is delegated to the robotstxt crate. Group structure, crawl
//! delays and sitemap pointers are read directly from the body.

use robotstxt::DefaultMatcher;

/// One `User-agent` group of a robots.txt body
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RobotsGroup {
    /// Lowercased agent tokens naming this group
    pub agents: Vec<String>,
    pub allow: Vec<String>,
    pub disallow: Vec<String>,
    pub crawl_delay: Option<f64>,
}

impl RobotsGroup {
    fn is_wildcard(&self) -> bool {
        self.agents.iter().any(|a| a == "*")
    }

    /// Whole-token comparison, the same rule `DefaultMatcher` applies
    fn matches_agent(&self, normalized_agent: &str) -> bool {
        self.agents.iter().any(|a| {
            let token = product_token(a);
            token != "*" && !token.is_empty() && token == normalized_agent
        })
    }
}

/// Leading run of `[A-Za-z_-]` characters, so `googlebot/2.1` names `googlebot`
fn product_token(agent: &str) -> &str {
    let end = agent
        .find(|c: char| !(c.is_ascii_alphabetic() || c == '-' || c == '_'))
        .unwrap_or(agent.len());
    &agent[..end]
}

/// Parsed robots.txt data
#[derive(Debug, Clone)]
pub struct ParsedRobots {
    /// Raw robots.txt content
    content: String,
    /// Everything is allowed (missing or unreachable robots.txt)
    allow_all: bool,
    /// Everything is disallowed (robots.txt access was refused)
    disallow_all: bool,
    groups: Vec<RobotsGroup>,
    sitemaps: Vec<String>,
}

impl ParsedRobots {
    /// Creates a new ParsedRobots from raw robots.txt content
    pub fn from_content(content: &str) -> Self {
        let (groups, sitemaps) = parse_groups(content);
        Self {
            content: content.to_string(),
            allow_all: false,
            disallow_all: false,
            groups,
            sitemaps,
        }
    }

    /// Creates a permissive ParsedRobots that allows everything
    ///
    /// This is used when robots.txt is missing or cannot be fetched.
    pub fn allow_all() -> Self {
        Self {
            content: String::new(),
            allow_all: true,
            disallow_all: false,
            groups: Vec::new(),
            sitemaps: Vec::new(),
        }
    }

    /// Creates a ParsedRobots that denies everything
    ///
    /// This is used when the server refuses access to robots.txt (401/403).
    pub fn disallow_all() -> Self {
        Self {
            content: String::new(),
            allow_all: false,
            disallow_all: true,
            groups: Vec::new(),
            sitemaps: Vec::new(),
        }
    }

    /// Returns the raw robots.txt content
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Returns the parsed `User-agent` groups in file order
    pub fn groups(&self) -> &[RobotsGroup] {
        &self.groups
    }

    /// Returns the `Sitemap:` URLs listed in the file
    pub fn sitemaps(&self) -> &[String] {
        &self.sitemaps
    }

    /// Checks if a URL is allowed for the given user agent
    ///
    /// # Arguments
    ///
    /// * `url` - The URL to check
    /// * `user_agent` - The agent token
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        if self.disallow_all {
            return false;
        }

        if self.allow_all || self.content.is_empty() {
            return true;
        }

        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, user_agent, url)
    }

    /// Returns the group governing `user_agent`
    ///
    /// A group naming the agent wins over the wildcard group.
    pub fn group_for(&self, user_agent: &str) -> Option<&RobotsGroup> {
        let normalized_agent = user_agent.to_lowercase();

        self.groups
            .iter()
            .find(|g| g.matches_agent(&normalized_agent))
            .or_else(|| self.groups.iter().find(|g| g.is_wildcard()))
    }

    /// Gets the crawl delay for a specific user agent
    ///
    /// # Returns
    ///
    /// * `Some(f64)` - The crawl delay in seconds
    /// * `None` - If no crawl delay is specified
    pub fn crawl_delay(&self, user_agent: &str) -> Option<f64> {
        if self.allow_all || self.disallow_all {
            return None;
        }
        self.group_for(user_agent).and_then(|g| g.crawl_delay)
    }

    /// Returns the non-empty `Disallow` rules that apply to `user_agent`
    pub fn disallow_rules(&self, user_agent: &str) -> Vec<String> {
        if self.disallow_all {
            return vec!["/".to_string()];
        }
        self.group_for(user_agent)
            .map(|g| g.disallow.clone())
            .unwrap_or_default()
    }
}

/// Splits a robots.txt body into agent groups and sitemap pointers
///
/// Consecutive `User-agent` lines share a group; a `User-agent` line that
/// follows any rule starts a new one. Rules before the first `User-agent`
/// line are ignored.
fn parse_groups(content: &str) -> (Vec<RobotsGroup>, Vec<String>) {
    let mut groups: Vec<RobotsGroup> = Vec::new();
    let mut sitemaps = Vec::new();
    let mut current: Option<RobotsGroup> = None;
    let mut in_rules = false;

    for line in content.lines() {
        let line = match line.split_once('#') {
            Some((before, _)) => before,
            None => line,
        }
        .trim();

        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().to_lowercase();
        let value = value.trim();

        match key.as_str() {
            "user-agent" => {
                if in_rules {
                    if let Some(group) = current.take() {
                        groups.push(group);
                    }
                    in_rules = false;
                }
                current
                    .get_or_insert_with(RobotsGroup::default)
                    .agents
                    .push(value.to_lowercase());
            }
            "allow" | "disallow" | "crawl-delay" => {
                let Some(group) = current.as_mut() else {
                    continue;
                };
                in_rules = true;
                match key.as_str() {
                    "allow" if !value.is_empty() => group.allow.push(value.to_string()),
                    "disallow" if !value.is_empty() => group.disallow.push(value.to_string()),
                    "crawl-delay" => {
                        if let Ok(delay) = value.parse::<f64>() {
                            if delay.is_finite() && delay >= 0.0 {
                                group.crawl_delay = Some(delay);
                            }
                        }
                    }
                    _ => {}
                }
            }
            "sitemap" => {
                if !value.is_empty() {
                    sitemaps.push(value.to_string());
                }
            }
            _ => {}
        }
    }

    if let Some(group) = current {
        groups.push(group);
    }

    (groups, sitemaps)
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://example.com";

    fn url(path: &str) -> String {
        format!("{}{}", URL, path)
    }

    #[test]
    fn test_allow_all() {
        let robots = ParsedRobots::allow_all();
        assert!(robots.is_allowed(&url("/any/path"), "TestBot"));
        assert!(robots.is_allowed(&url("/admin"), "TestBot"));
    }

    #[test]
    fn test_disallow_all() {
        let robots = ParsedRobots::disallow_all();
        assert!(!robots.is_allowed(&url("/"), "TestBot"));
        assert_eq!(robots.disallow_rules("*"), vec!["/".to_string()]);
        assert_eq!(robots.crawl_delay("*"), None);
    }

    #[test]
    fn test_parse_disallow_all() {
        let robots = ParsedRobots::from_content("User-agent: *\nDisallow: /");
        assert!(!robots.is_allowed(&url("/"), "TestBot"));
        assert!(!robots.is_allowed(&url("/page"), "TestBot"));
    }

    #[test]
    fn test_parse_disallow_specific() {
        let robots = ParsedRobots::from_content("User-agent: *\nDisallow: /admin");
        assert!(robots.is_allowed(&url("/"), "TestBot"));
        assert!(robots.is_allowed(&url("/page"), "TestBot"));
        assert!(!robots.is_allowed(&url("/admin"), "TestBot"));
        assert!(!robots.is_allowed(&url("/admin/users"), "TestBot"));
    }

    #[test]
    fn test_parse_allow_and_disallow() {
        let robots =
            ParsedRobots::from_content("User-agent: *\nDisallow: /private\nAllow: /private/public");
        assert!(robots.is_allowed(&url("/"), "TestBot"));
        assert!(!robots.is_allowed(&url("/private"), "TestBot"));
        assert!(robots.is_allowed(&url("/private/public"), "TestBot"));
    }

    #[test]
    fn test_parse_specific_user_agent() {
        let content = "User-agent: BadBot\nDisallow: /\n\nUser-agent: *\nAllow: /";
        let robots = ParsedRobots::from_content(content);
        assert!(robots.is_allowed(&url("/page"), "GoodBot"));
        assert!(!robots.is_allowed(&url("/page"), "BadBot"));
    }

    #[test]
    fn test_wildcard_token_uses_global_group() {
        let content = "User-agent: BadBot\nDisallow: /\n\nUser-agent: *\nDisallow: /private";
        let robots = ParsedRobots::from_content(content);
        assert!(robots.is_allowed(&url("/page"), "*"));
        assert!(!robots.is_allowed(&url("/private/x"), "*"));
        assert_eq!(robots.disallow_rules("*"), vec!["/private".to_string()]);
    }

    #[test]
    fn test_invalid_robots_txt() {
        let robots = ParsedRobots::from_content("This is not valid robots.txt {{{");
        assert!(robots.is_allowed(&url("/any/path"), "TestBot"));
        assert!(robots.groups().is_empty());
    }

    #[test]
    fn test_empty_robots_txt() {
        let robots = ParsedRobots::from_content("");
        assert!(robots.is_allowed(&url("/any/path"), "TestBot"));
    }

    #[test]
    fn test_crawl_delay_wildcard() {
        let robots = ParsedRobots::from_content("User-agent: *\nCrawl-delay: 10\nDisallow: /admin");
        assert_eq!(robots.crawl_delay("TestBot"), Some(10.0));
        assert_eq!(robots.crawl_delay("*"), Some(10.0));
    }

    #[test]
    fn test_crawl_delay_specific_agent() {
        let content = "User-agent: TestBot\nCrawl-delay: 5\n\nUser-agent: *\nCrawl-delay: 10";
        let robots = ParsedRobots::from_content(content);
        assert_eq!(robots.crawl_delay("TestBot"), Some(5.0));
        assert_eq!(robots.crawl_delay("OtherBot"), Some(10.0));
    }

    #[test]
    fn test_crawl_delay_no_delay() {
        let robots = ParsedRobots::from_content("User-agent: *\nDisallow: /admin");
        assert_eq!(robots.crawl_delay("TestBot"), None);
    }

    #[test]
    fn test_crawl_delay_decimal() {
        let robots = ParsedRobots::from_content("User-agent: *\nCrawl-delay: 2.5");
        assert_eq!(robots.crawl_delay("TestBot"), Some(2.5));
    }

    #[test]
    fn test_crawl_delay_negative_ignored() {
        let robots = ParsedRobots::from_content("User-agent: *\nCrawl-delay: -3");
        assert_eq!(robots.crawl_delay("TestBot"), None);
    }

    #[test]
    fn test_crawl_delay_case_insensitive() {
        let robots = ParsedRobots::from_content("User-agent: TestBot\ncrawl-delay: 7");
        assert_eq!(robots.crawl_delay("testbot"), Some(7.0));
        assert_eq!(robots.crawl_delay("TESTBOT"), Some(7.0));
    }

    #[test]
    fn test_agent_prefix_does_not_select_longer_group() {
        let content = "User-agent: sumibot\nCrawl-delay: 5\nDisallow: /bot-only\n\nUser-agent: *\nCrawl-delay: 1\nDisallow: /all";
        let robots = ParsedRobots::from_content(content);

        assert_eq!(robots.crawl_delay("sumi"), Some(1.0));
        assert_eq!(robots.disallow_rules("sumi"), vec!["/all".to_string()]);
        assert!(robots.is_allowed(&url("/bot-only"), "sumi"));
        assert!(!robots.is_allowed(&url("/all"), "sumi"));

        assert_eq!(robots.crawl_delay("SumiBot"), Some(5.0));
        assert_eq!(robots.disallow_rules("SumiBot"), vec!["/bot-only".to_string()]);
        assert!(!robots.is_allowed(&url("/bot-only"), "SumiBot"));
        assert!(robots.is_allowed(&url("/all"), "SumiBot"));
    }

    #[test]
    fn test_group_agent_version_suffix_ignored() {
        let robots = ParsedRobots::from_content("User-agent: SumiBot/2.1\nCrawl-delay: 4");
        assert_eq!(robots.crawl_delay("sumibot"), Some(4.0));
        assert_eq!(robots.crawl_delay("sumibot2"), None);
    }

    #[test]
    fn test_crawl_delay_multiple_user_agents() {
        let robots = ParsedRobots::from_content("User-agent: BotA\nUser-agent: BotB\nCrawl-delay: 3");
        assert_eq!(robots.crawl_delay("BotA"), Some(3.0));
        assert_eq!(robots.crawl_delay("BotB"), Some(3.0));
        assert_eq!(robots.crawl_delay("BotC"), None);
    }

    #[test]
    fn test_new_group_after_rules() {
        let content = "User-agent: BotA\nDisallow: /a\nUser-agent: BotB\nDisallow: /b";
        let robots = ParsedRobots::from_content(content);
        assert_eq!(robots.groups().len(), 2);
        assert_eq!(robots.disallow_rules("BotA"), vec!["/a".to_string()]);
        assert_eq!(robots.disallow_rules("BotB"), vec!["/b".to_string()]);
    }

    #[test]
    fn test_comments_and_empty_disallow() {
        let content = "# robots\nUser-agent: * # everyone\nDisallow:\nDisallow: /tmp # scratch";
        let robots = ParsedRobots::from_content(content);
        assert_eq!(robots.disallow_rules("*"), vec!["/tmp".to_string()]);
    }

    #[test]
    fn test_sitemaps_collected() {
        let content = "Sitemap: https://example.com/sitemap.xml\nUser-agent: *\nDisallow: /x\nsitemap: https://example.com/news.xml";
        let robots = ParsedRobots::from_content(content);
        assert_eq!(
            robots.sitemaps(),
            &[
                "https://example.com/sitemap.xml".to_string(),
                "https://example.com/news.xml".to_string()
            ]
        );
    }
}
