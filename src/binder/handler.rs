//! Handler methods as type-erased callables.
//!
//! Any async function taking the component (`Arc<T>`) followed by up to
//! twelve [`Param`]s and returning [`Replies`] is a [`Handler`]. Binding the
//! arguments happens left to right inside the returned future.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use super::context::RequestContext;
use super::error::Fault;
use super::resolver::Param;
use super::signature::Signature;
use super::writer::{Replies, Slot};

/// Boxed future produced by a handler call.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Vec<Slot>, Fault>> + Send + 'static>>;

/// A handler method of component `T`.
///
/// `Args` only disambiguates the implementations per arity.
pub trait Handler<T, Args>: Clone + Send + Sync + 'static {
    /// Parameter and return kinds.
    fn signature(&self) -> Signature;

    /// Bind arguments from the request and run the method.
    fn call(&self, target: Arc<T>, cx: RequestContext) -> HandlerFuture;
}

macro_rules! impl_handler {
    ($($ty:ident),*) => {
        #[allow(non_snake_case, unused_mut, unused_variables)]
        impl<F, Fut, T, R, $($ty,)*> Handler<T, ($($ty,)*)> for F
        where
            F: Fn(Arc<T>, $($ty,)*) -> Fut + Clone + Send + Sync + 'static,
            Fut: Future<Output = R> + Send + 'static,
            T: Send + Sync + 'static,
            R: Replies,
            $($ty: Param,)*
        {
            fn signature(&self) -> Signature {
                Signature::new(vec![$($ty::KIND,)*], R::kinds())
            }

            fn call(&self, target: Arc<T>, cx: RequestContext) -> HandlerFuture {
                let handler = self.clone();
                Box::pin(async move {
                    let mut cx = cx;
                    $(
                        let $ty = $ty::bind(&mut cx).await?;
                    )*
                    handler(target, $($ty,)*).await.into_slots()
                })
            }
        }
    };
}

impl_handler!();
impl_handler!(A1);
impl_handler!(A1, A2);
impl_handler!(A1, A2, A3);
impl_handler!(A1, A2, A3, A4);
impl_handler!(A1, A2, A3, A4, A5);
impl_handler!(A1, A2, A3, A4, A5, A6);
impl_handler!(A1, A2, A3, A4, A5, A6, A7);
impl_handler!(A1, A2, A3, A4, A5, A6, A7, A8);
impl_handler!(A1, A2, A3, A4, A5, A6, A7, A8, A9);
impl_handler!(A1, A2, A3, A4, A5, A6, A7, A8, A9, A10);
impl_handler!(A1, A2, A3, A4, A5, A6, A7, A8, A9, A10, A11);
impl_handler!(A1, A2, A3, A4, A5, A6, A7, A8, A9, A10, A11, A12);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::context::PathVars;
    use crate::binder::signature::{ParamKind, ReplyKind};
    use crate::http::ResponseWriter;
    use crate::serialization::JsonSerializer;
    use axum::body::Body;
    use axum::http::{HeaderMap, Request};
    use std::collections::HashMap;

    struct Greeter {
        greeting: &'static str,
    }

    impl Greeter {
        async fn greet(self: Arc<Self>, vars: PathVars, body: String) -> (u16, String) {
            let name = vars.get("name").unwrap_or("nobody");
            (201, format!("{} {name}: {body}", self.greeting))
        }

        async fn nothing(self: Arc<Self>) {}
    }

    fn signature_of<H: Handler<Greeter, Args>, Args>(handler: H) -> Signature {
        handler.signature()
    }

    #[test]
    fn test_signatures() {
        assert_eq!(
            signature_of(Greeter::greet),
            Signature::new(
                vec![ParamKind::PathVars, ParamKind::Text],
                vec![ReplyKind::Status, ReplyKind::Body]
            )
        );
        assert_eq!(signature_of(Greeter::nothing), Signature::default());
        assert_eq!(
            signature_of(|_: Arc<Greeter>, h: HeaderMap| async move { h.len() as u16 }),
            Signature::new(vec![ParamKind::Headers], vec![ReplyKind::Status])
        );
    }

    #[tokio::test]
    async fn test_call_binds_in_order() {
        let (parts, body) = Request::builder()
            .uri("/greet/ada")
            .body(Body::from("hi"))
            .unwrap()
            .into_parts();
        let (writer, _head) = ResponseWriter::channel(1);
        let vars = HashMap::from([("name".to_string(), "ada".to_string())]);
        let cx = RequestContext::new(parts, body, vars, writer, Arc::new(JsonSerializer));

        let target = Arc::new(Greeter { greeting: "hello" });
        let slots = Handler::call(&Greeter::greet, target, cx).await.unwrap();
        assert_eq!(slots.len(), 2);
        assert!(matches!(slots[0], Slot::Status(201)));
        match &slots[1] {
            Slot::Body(body) => assert_eq!(body, "hello ada: hi"),
            other => panic!("unexpected slot {other:?}"),
        }
    }
}
