#![forbid(unsafe_code)]

use log::{error, info, warn};
use serde::Serialize;
use tera::{Context, Tera};

use crate::utils::errors::RenderError;

// Template names.
pub const BASE_TEMPLATE  : &str = "base.html";
pub const INDEX_TEMPLATE : &str = "index.html";
pub const VIEW_TEMPLATE  : &str = "view.html";
pub const EDIT_TEMPLATE  : &str = "edit.html";
pub const BLOG_TEMPLATE  : &str = "blog.html";

const TEMPLATE_NAMES: [&str; 5] = [BASE_TEMPLATE, INDEX_TEMPLATE, VIEW_TEMPLATE, EDIT_TEMPLATE, BLOG_TEMPLATE];

// ***************************************************************************
//                                 Renderer
// ***************************************************************************
/** Renders named templates.  Templates ending in .html are autoescaped, so
 * only values passed through the safe filter are emitted as markup.
 */
pub struct Renderer {
    tera: Tera,
    site_title: String,
}

impl Renderer {
    /// Use the templates compiled into the binary.
    pub fn embedded(site_title: &str) -> Result<Self, RenderError> {
        let mut tera = Tera::default();
        tera.add_raw_templates(vec![
            (BASE_TEMPLATE, include_str!("../../templates/base.html")),
            (INDEX_TEMPLATE, include_str!("../../templates/index.html")),
            (VIEW_TEMPLATE, include_str!("../../templates/view.html")),
            (EDIT_TEMPLATE, include_str!("../../templates/edit.html")),
            (BLOG_TEMPLATE, include_str!("../../templates/blog.html")),
        ])?;
        Ok(Self::with_tera(tera, site_title))
    }

    /// Load every .html file under dir.  Missing templates are reported now
    /// and fail the requests that need them.
    pub fn from_dir(dir: &str, site_title: &str) -> Result<Self, RenderError> {
        let tera = Tera::new(&format!("{}/**/*.html", dir))?;
        let loaded: Vec<&str> = tera.get_template_names().collect();
        for name in TEMPLATE_NAMES {
            if !loaded.contains(&name) {
                warn!("Template {} not found in {}", name, dir);
            }
        }
        info!("Loaded {} templates from {}", loaded.len(), dir);
        Ok(Self::with_tera(tera, site_title))
    }

    pub fn with_tera(tera: Tera, site_title: &str) -> Self {
        Self {tera, site_title: site_title.to_string()}
    }

    // -----------------------------------------------------------------------
    // render:
    // -----------------------------------------------------------------------
    /** Render the named template.  The data must serialize to a map; the site
     * title is always available as site_title.
     */
    pub fn render<T: Serialize>(&self, name: &str, data: &T) -> Result<String, RenderError> {
        Context::from_serialize(data)
            .and_then(|mut ctx| {
                ctx.insert("site_title", &self.site_title);
                self.tera.render(name, &ctx)
            })
            .map_err(|e| {
                error!("Unable to render template {}: {:?}", name, e);
                RenderError(e)
            })
    }
}
