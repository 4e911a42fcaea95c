//! URL builders for the image-processing endpoints. String assembly only; the
//! resulting URLs are fetched by end users, not by this client.

/// Options for the `imageMogr` transform endpoint.
#[derive(Clone, Debug, Default)]
pub struct ImageMogrify {
    /// Target size geometry, e.g. `120x120`.
    pub thumbnail: Option<String>,
    /// Crop anchor: `NorthWest`, `Center`, `SouthEast`, ...
    pub gravity: Option<String>,
    /// Size-and-offset geometry for cropping.
    pub crop: Option<String>,
    pub quality: Option<String>,
    pub rotate: Option<String>,
    /// Destination format: `jpg`, `gif`, `png`, ...
    pub format: Option<String>,
    pub auto_orient: bool,
}

/// Render the `imageMogr/...` parameter string, keeping the fixed key order
/// the service expects.
pub fn mogrify_params(opts: &ImageMogrify) -> String {
    let keyed = [
        ("thumbnail", &opts.thumbnail),
        ("gravity", &opts.gravity),
        ("crop", &opts.crop),
        ("quality", &opts.quality),
        ("rotate", &opts.rotate),
        ("format", &opts.format),
    ];

    let mut params = String::from("imageMogr");
    for (key, value) in keyed {
        if let Some(value) = value.as_deref().filter(|value| !value.is_empty()) {
            params.push('/');
            params.push_str(key);
            params.push('/');
            params.push_str(value);
        }
    }
    if opts.auto_orient {
        params.push_str("/auto-orient");
    }
    params
}

pub fn image_preview_url(url: &str, thumb_type: u32) -> String {
    format!("{url}/imagePreview/{thumb_type}")
}

pub fn image_info_url(url: &str) -> String {
    format!("{url}/imageInfo")
}

pub fn image_mogrify_preview_url(source_url: &str, opts: &ImageMogrify) -> String {
    format!("{}?{}", source_url, mogrify_params(opts))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mogrify_params_keeps_fixed_key_order() {
        let opts = ImageMogrify {
            format: Some("jpg".to_string()),
            thumbnail: Some("120x120".to_string()),
            auto_orient: true,
            ..Default::default()
        };
        assert_eq!(
            mogrify_params(&opts),
            "imageMogr/thumbnail/120x120/format/jpg/auto-orient"
        );
    }

    #[test]
    fn empty_options_render_bare_prefix() {
        assert_eq!(mogrify_params(&ImageMogrify::default()), "imageMogr");
    }

    #[test]
    fn preview_and_info_urls() {
        assert_eq!(
            image_preview_url("http://cdn.example.com/k", 1),
            "http://cdn.example.com/k/imagePreview/1"
        );
        assert_eq!(
            image_info_url("http://cdn.example.com/k"),
            "http://cdn.example.com/k/imageInfo"
        );
    }
}
