//! 完成信号
//!
//! 单线程、帧驱动：信号在后续帧中被调度器结算，从不阻塞帧循环。
//! 一个信号只结算一次，之后的结算调用全部忽略。

use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

/// 完成状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionState {
    /// 进行中
    Pending,
    /// 正常结束
    Completed,
    /// 被停止或被同类新过渡取代（视为已完成，不应用目标值）
    Cancelled,
    /// 失败（例如音频播放错误）
    Failed(String),
}

impl CompletionState {
    pub fn is_settled(&self) -> bool {
        !matches!(self, CompletionState::Pending)
    }

    /// Completed 与 Cancelled 都算 resolve
    pub fn is_resolved(&self) -> bool {
        matches!(self, CompletionState::Completed | CompletionState::Cancelled)
    }
}

type SettleCallback = Box<dyn FnOnce(&CompletionState)>;

struct CompletionInner {
    state: CompletionState,
    callbacks: Vec<SettleCallback>,
    waker: Option<Waker>,
}

/// 可克隆的完成句柄
#[derive(Clone)]
pub struct Completion {
    inner: Rc<RefCell<CompletionInner>>,
}

impl Completion {
    /// 创建未结算的信号
    pub fn new() -> Self {
        Self::with_state(CompletionState::Pending)
    }

    /// 创建已完成的信号
    pub fn completed() -> Self {
        Self::with_state(CompletionState::Completed)
    }

    /// 创建已失败的信号
    pub fn failed(message: impl Into<String>) -> Self {
        Self::with_state(CompletionState::Failed(message.into()))
    }

    fn with_state(state: CompletionState) -> Self {
        Self {
            inner: Rc::new(RefCell::new(CompletionInner {
                state,
                callbacks: Vec::new(),
                waker: None,
            })),
        }
    }

    pub fn state(&self) -> CompletionState {
        self.inner.borrow().state.clone()
    }

    pub fn is_settled(&self) -> bool {
        self.inner.borrow().state.is_settled()
    }

    pub fn is_resolved(&self) -> bool {
        self.inner.borrow().state.is_resolved()
    }

    /// 标记完成，返回本次调用是否真正结算
    pub fn complete(&self) -> bool {
        self.settle(CompletionState::Completed)
    }

    /// 标记取消（resolve，不 reject）
    pub fn cancel(&self) -> bool {
        self.settle(CompletionState::Cancelled)
    }

    /// 标记失败
    pub fn fail(&self, message: impl Into<String>) -> bool {
        self.settle(CompletionState::Failed(message.into()))
    }

    fn settle(&self, state: CompletionState) -> bool {
        let (callbacks, waker) = {
            let mut inner = self.inner.borrow_mut();
            if inner.state.is_settled() {
                return false;
            }
            inner.state = state.clone();
            (std::mem::take(&mut inner.callbacks), inner.waker.take())
        };

        // 回调在释放借用之后执行，允许回调里再查询本信号
        for callback in callbacks {
            callback(&state);
        }
        if let Some(waker) = waker {
            waker.wake();
        }
        true
    }

    /// 注册结算回调；已结算时立即调用
    pub fn on_settled(&self, callback: impl FnOnce(&CompletionState) + 'static) {
        let state = {
            let mut inner = self.inner.borrow_mut();
            if !inner.state.is_settled() {
                inner.callbacks.push(Box::new(callback));
                return;
            }
            inner.state.clone()
        };
        callback(&state);
    }
}

impl Default for Completion {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion").field("state", &self.state()).finish()
    }
}

impl Future for Completion {
    type Output = CompletionState;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut inner = self.inner.borrow_mut();
        if inner.state.is_settled() {
            Poll::Ready(inner.state.clone())
        } else {
            inner.waker = Some(cx.waker().clone());
            Poll::Pending
        }
    }
}
