//! Texture handles.
//!
//! Decoding and uploading images is the host's job. The factory only needs
//! to know when each texture becomes usable, so a [`Texture`] is a shared
//! status cell that the host's [`TextureSource`] settles later (or already
//! settled, for cached images).

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TextureStatus {
    Loading,
    Valid,
    Failed(String),
}

impl TextureStatus {
    #[inline]
    pub fn is_settled(&self) -> bool {
        !matches!(self, Self::Loading)
    }
}

type Waiter = Box<dyn FnOnce(&TextureStatus)>;

struct TextureInner {
    id: Uuid,
    url: String,
    status: RefCell<TextureStatus>,
    waiters: RefCell<Vec<Waiter>>,
}

/// Cloning shares the status.
#[derive(Clone)]
pub struct Texture {
    inner: Rc<TextureInner>,
}

impl fmt::Debug for Texture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Texture")
            .field("id", &self.inner.id)
            .field("url", &self.inner.url)
            .field("status", &*self.inner.status.borrow())
            .finish()
    }
}

impl Texture {
    fn with_status(url: impl Into<String>, status: TextureStatus) -> Self {
        Self {
            inner: Rc::new(TextureInner {
                id: Uuid::new_v4(),
                url: url.into(),
                status: RefCell::new(status),
                waiters: RefCell::new(Vec::new()),
            }),
        }
    }

    pub fn loading(url: impl Into<String>) -> Self {
        Self::with_status(url, TextureStatus::Loading)
    }

    /// A texture that is usable right away.
    pub fn valid(url: impl Into<String>) -> Self {
        Self::with_status(url, TextureStatus::Valid)
    }

    #[inline]
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    #[inline]
    pub fn url(&self) -> &str {
        &self.inner.url
    }

    pub fn status(&self) -> TextureStatus {
        self.inner.status.borrow().clone()
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        *self.inner.status.borrow() == TextureStatus::Valid
    }

    pub fn resolve(&self) -> bool {
        self.settle(TextureStatus::Valid)
    }

    pub fn fail(&self, reason: impl Into<String>) -> bool {
        self.settle(TextureStatus::Failed(reason.into()))
    }

    /// Settle once; later calls are ignored and return false.
    fn settle(&self, status: TextureStatus) -> bool {
        {
            let mut current = self.inner.status.borrow_mut();
            if current.is_settled() {
                return false;
            }
            *current = status.clone();
        }
        let waiters = std::mem::take(&mut *self.inner.waiters.borrow_mut());
        for waiter in waiters {
            waiter(&status);
        }
        true
    }

    /// Run `callback` when the texture settles, or right away if it already
    /// has.
    pub fn on_settled(&self, callback: impl FnOnce(&TextureStatus) + 'static) {
        let status = self.status();
        if status.is_settled() {
            callback(&status);
        } else {
            self.inner.waiters.borrow_mut().push(Box::new(callback));
        }
    }
}

impl PartialEq for Texture {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Host-provided image loading.
pub trait TextureSource {
    fn load(&self, url: &str, cross_origin: Option<&str>) -> Texture;
}
