use minijinja::{Environment, Value, context};

use crate::core::{codec::EncodedImage, error::SkinCheckError, yolo::DetectionRecord};

/// The two forms that feed the upload pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormPage {
    Camera,
    Upload,
}

impl FormPage {
    pub fn path(self) -> &'static str {
        match self {
            FormPage::Camera => "/camera",
            FormPage::Upload => "/upload",
        }
    }

    fn template(self) -> &'static str {
        match self {
            FormPage::Camera => "camera.html",
            FormPage::Upload => "upload.html",
        }
    }
}

/// HTML templates, compiled into the binary.
pub struct Pages {
    env: Environment<'static>,
}

impl Pages {
    pub fn new() -> Result<Self, SkinCheckError> {
        let mut env = Environment::new();
        env.add_template("base.html", include_str!("../../templates/base.html"))?;
        env.add_template("index.html", include_str!("../../templates/index.html"))?;
        env.add_template("camera.html", include_str!("../../templates/camera.html"))?;
        env.add_template("upload.html", include_str!("../../templates/upload.html"))?;
        env.add_template("result.html", include_str!("../../templates/result.html"))?;
        Ok(Self { env })
    }

    pub fn index(&self, flash: Option<&str>) -> Result<String, SkinCheckError> {
        let tmpl = self.env.get_template("index.html")?;
        Ok(tmpl.render(context! { flash })?)
    }

    pub fn form(&self, page: FormPage, flash: Option<&str>) -> Result<String, SkinCheckError> {
        let tmpl = self.env.get_template(page.template())?;
        // a static route path, safe to emit unescaped
        let action = Value::from_safe_string(page.path().to_owned());
        Ok(tmpl.render(context! { flash, action })?)
    }

    pub fn result(
        &self,
        image: &EncodedImage,
        results: &[DetectionRecord],
        input_size: u32,
    ) -> Result<String, SkinCheckError> {
        // base64 and the record JSON go into a <script> block untouched
        let image_uri = image.data_uri();
        let image_json = serde_json::to_string(&image_uri)?;
        let results_json = serde_json::to_string(results)?.replace('<', "\\u003c");

        let tmpl = self.env.get_template("result.html")?;
        Ok(tmpl.render(context! {
            image => Value::from_safe_string(image_uri),
            image_json => Value::from_safe_string(image_json),
            results,
            results_json => Value::from_safe_string(results_json),
            input_size,
        })?)
    }
}
