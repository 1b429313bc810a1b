//! Closure-backed image provider.

use gen_core::{ImageProvider, Prompt, ProviderFuture};

/// An [`ImageProvider`] built from a function.
///
/// Handy for wiring a stub backend in tests or local runs.
pub struct FnProvider<F>
where
    F: Fn(&Prompt) -> ProviderFuture + Send + Sync + 'static,
{
    name: String,
    generate: F,
}

impl<F> FnProvider<F>
where
    F: Fn(&Prompt) -> ProviderFuture + Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>, generate: F) -> Self {
        Self {
            name: name.into(),
            generate,
        }
    }
}

impl<F> ImageProvider for FnProvider<F>
where
    F: Fn(&Prompt) -> ProviderFuture + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn generate(&self, prompt: &Prompt) -> ProviderFuture {
        (self.generate)(prompt)
    }
}

/// Build an [`FnProvider`] from an async block over an owned prompt.
///
/// ```ignore
/// let provider = actors::image_provider!("echo", |prompt| {
///     Ok(vec![GeneratedImage::png(prompt.as_str().as_bytes().to_vec())])
/// });
/// ```
#[macro_export]
macro_rules! image_provider {
    ($name:expr, |$prompt:ident| $body:expr) => {
        $crate::FnProvider::new($name, |$prompt: &$crate::gen_core::Prompt| {
            let $prompt = $prompt.clone();
            ::std::boxed::Box::pin(async move { $body })
                as $crate::gen_core::ProviderFuture
        })
    };
}
