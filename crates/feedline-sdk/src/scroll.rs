//! 滚动/视口协调器模块
//!
//! 功能包括：
//! - 滚动方向检测（带迟滞，避免亚像素抖动导致方向翻转）
//! - "回到顶部" 按钮信号（电平触发，固定 200px 阈值）
//! - 导航栏显隐信号（仅移动端，程序化回顶期间完全抑制）
//! - 触底检测（feed 翻页触发）
//! - 程序化回到顶部（按平台选择策略，移动端带抑制窗口）
//!
//! 所有 DOM 访问隔离在 `ScrollSurface` trait 之后，阈值与方向逻辑
//! 不依赖渲染环境即可单测。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info};

/// "回到顶部" 按钮阈值（固定常量，不按设备配置）
pub const SCROLL_TO_TOP_BUTTON_THRESHOLD: f64 = 200.0;

/// 移动端设备判定：视口宽度小于该值视为移动端
pub const MOBILE_MAX_WIDTH: f64 = 768.0;

/// 滚动方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScrollDirection {
    Up,
    Down,
}

/// 按形态（移动端 / 桌面端）选择的滚动阈值配置
///
/// 每次 resize 按设备判定整体切换，切换后不可变。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScrollConfig {
    /// 触底检测余量（px）
    pub scroll_threshold: f64,
    /// 导航栏显示阈值（px，位于其上必显示）
    pub navbar_show_threshold: f64,
    /// 导航栏隐藏阈值（px，向下越过才隐藏）
    pub navbar_hide_threshold: f64,
    /// 程序化回顶时锚点偏移补偿（px）
    pub scroll_to_top_offset: f64,
    /// 程序化回顶的抑制窗口（ms）
    pub scroll_to_top_timeout_ms: u64,
    /// 方向判定迟滞阈值（px）
    pub scroll_direction_threshold: f64,
}

impl ScrollConfig {
    /// 移动端（触摸）配置
    pub fn mobile() -> Self {
        Self {
            scroll_threshold: 200.0,
            navbar_show_threshold: 50.0,
            navbar_hide_threshold: 120.0,
            scroll_to_top_offset: 60.0,
            scroll_to_top_timeout_ms: 600,
            scroll_direction_threshold: 10.0,
        }
    }

    /// 桌面端（指针）配置
    pub fn desktop() -> Self {
        Self {
            scroll_threshold: 300.0,
            navbar_show_threshold: 40.0,
            navbar_hide_threshold: 100.0,
            scroll_to_top_offset: 0.0,
            scroll_to_top_timeout_ms: 400,
            scroll_direction_threshold: 5.0,
        }
    }

    /// 按设备类别选择配置
    pub fn for_device(is_mobile: bool) -> Self {
        if is_mobile {
            Self::mobile()
        } else {
            Self::desktop()
        }
    }
}

/// 单次滚动采样（一致性快照：三个值来自同一帧，不与后续采样交错）
#[derive(Debug, Clone, Copy)]
pub struct ScrollSample {
    pub scroll_top: f64,
    pub viewport_height: f64,
    pub scroll_height: f64,
}

/// 协调器级滚动信号（UI 订阅，取代原始 DOM 事件）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollSignal {
    /// 显示 "回到顶部" 按钮
    ShowScrollToTopButton,
    /// 隐藏 "回到顶部" 按钮
    HideScrollToTopButton,
    /// 显示导航栏（仅移动端发出）
    ShowNavbar,
    /// 隐藏导航栏（仅移动端发出）
    HideNavbar,
    /// 触底（feed 请求下一页）
    ScrollEnd,
}

/// 视图抽象：把滚动容器操作隔离在渲染环境之外
#[async_trait]
pub trait ScrollSurface: Send + Sync + std::fmt::Debug {
    /// 已知滚动锚点在容器内的偏移；锚点缺失返回 None
    async fn anchor_offset(&self) -> Option<f64>;

    /// 把已知滚动容器滚动到指定偏移；容器缺失返回 false
    async fn scroll_container_to(&self, offset: f64) -> bool;

    /// 用原生 "滚入视图（nearest）" 行为把锚点滚入视图；失败返回 false
    ///
    /// 该策略不经过中间位置，方向逻辑不会误读，因此无需抑制窗口。
    async fn scroll_anchor_into_view(&self) -> bool;

    /// 滚动窗口到顶部（最终回退）
    async fn scroll_window_to_top(&self);
}

/// 协调器内部状态
#[derive(Debug)]
struct ScrollState {
    config: ScrollConfig,
    last_scroll_top: f64,
    direction: ScrollDirection,
    /// 程序化回顶进行中（导航栏信号抑制标志）
    is_scrolling_to_top: bool,
    is_mobile: bool,
}

/// 滚动/视口协调器
pub struct ScrollCoordinator {
    surface: Arc<dyn ScrollSurface>,
    state: Arc<RwLock<ScrollState>>,
    signals: broadcast::Sender<ScrollSignal>,
}

impl ScrollCoordinator {
    /// 创建协调器，初始设备类别由调用方给出
    pub fn new(surface: Arc<dyn ScrollSurface>, is_mobile: bool) -> Self {
        let (signals, _) = broadcast::channel(64);

        Self {
            surface,
            state: Arc::new(RwLock::new(ScrollState {
                config: ScrollConfig::for_device(is_mobile),
                last_scroll_top: 0.0,
                direction: ScrollDirection::Down,
                is_scrolling_to_top: false,
                is_mobile,
            })),
            signals,
        }
    }

    /// 订阅协调器信号
    pub fn subscribe(&self) -> broadcast::Receiver<ScrollSignal> {
        self.signals.subscribe()
    }

    /// 当前滚动方向
    pub async fn direction(&self) -> ScrollDirection {
        self.state.read().await.direction
    }

    /// 当前生效的配置
    pub async fn config(&self) -> ScrollConfig {
        self.state.read().await.config
    }

    /// 程序化回顶是否进行中
    pub async fn is_scrolling_to_top(&self) -> bool {
        self.state.read().await.is_scrolling_to_top
    }

    /// 视口 resize：重新判定设备类别，类别变化时整体切换配置
    pub async fn handle_resize(&self, viewport_width: f64) {
        let is_mobile = viewport_width < MOBILE_MAX_WIDTH;
        let mut state = self.state.write().await;
        if state.is_mobile != is_mobile {
            info!(
                "设备类别变化: is_mobile={} -> {}，切换滚动配置",
                state.is_mobile, is_mobile
            );
            state.is_mobile = is_mobile;
            state.config = ScrollConfig::for_device(is_mobile);
        }
    }

    /// 处理一次滚动采样
    ///
    /// 方向更新与各阈值信号在同一把写锁内从同一快照计算，
    /// 不会与后续采样的值交错。
    pub async fn handle_scroll(&self, sample: ScrollSample) {
        let mut state = self.state.write().await;

        // 1. 方向迟滞：增量超过阈值才更新方向与基准位置
        let delta = sample.scroll_top - state.last_scroll_top;
        if delta.abs() > state.config.scroll_direction_threshold {
            state.direction = if delta > 0.0 {
                ScrollDirection::Down
            } else {
                ScrollDirection::Up
            };
            state.last_scroll_top = sample.scroll_top;
        }

        // 2. "回到顶部" 按钮：电平触发，每次采样都发出当前电平
        if sample.scroll_top >= SCROLL_TO_TOP_BUTTON_THRESHOLD {
            self.emit(ScrollSignal::ShowScrollToTopButton);
        } else {
            self.emit(ScrollSignal::HideScrollToTopButton);
        }

        // 3. 导航栏：仅移动端，程序化回顶期间完全抑制
        if state.is_mobile && !state.is_scrolling_to_top {
            if sample.scroll_top <= state.config.navbar_show_threshold {
                self.emit(ScrollSignal::ShowNavbar);
            } else if state.direction == ScrollDirection::Up {
                self.emit(ScrollSignal::ShowNavbar);
            } else if state.direction == ScrollDirection::Down
                && sample.scroll_top > state.config.navbar_hide_threshold
            {
                self.emit(ScrollSignal::HideNavbar);
            }
        }

        // 4. 触底检测
        if sample.scroll_top + sample.viewport_height
            >= sample.scroll_height - state.config.scroll_threshold
        {
            self.emit(ScrollSignal::ScrollEnd);
        }
    }

    /// 程序化回到顶部
    ///
    /// 移动端：在已知容器内计算锚点偏移并滚动，抑制窗口内忽略自身
    /// 诱发的滚动采样对导航栏的影响；桌面端：交给原生 nearest 滚动，
    /// 无需抑制。锚点缺失时回退到容器偏移 0，容器也缺失时回退到窗口。
    pub async fn scroll_to_top(&self) {
        let (is_mobile, config) = {
            let state = self.state.read().await;
            (state.is_mobile, state.config)
        };

        if is_mobile {
            self.state.write().await.is_scrolling_to_top = true;

            // 抑制窗口定时解除
            let state = self.state.clone();
            let timeout_ms = config.scroll_to_top_timeout_ms;
            tokio::spawn(async move {
                tokio::time::sleep(tokio::time::Duration::from_millis(timeout_ms)).await;
                state.write().await.is_scrolling_to_top = false;
                debug!("回顶抑制窗口结束");
            });

            match self.surface.anchor_offset().await {
                Some(offset) => {
                    let target = (offset - config.scroll_to_top_offset).max(0.0);
                    if !self.surface.scroll_container_to(target).await {
                        self.surface.scroll_window_to_top().await;
                    }
                }
                None => {
                    // 锚点缺失：容器滚到 0，容器也缺失则滚窗口
                    if !self.surface.scroll_container_to(0.0).await {
                        self.surface.scroll_window_to_top().await;
                    }
                }
            }
        } else {
            // 桌面端策略不经过中间位置，方向逻辑不会误读
            if !self.surface.scroll_anchor_into_view().await {
                if !self.surface.scroll_container_to(0.0).await {
                    self.surface.scroll_window_to_top().await;
                }
            }
        }
    }

    fn emit(&self, signal: ScrollSignal) {
        // 无订阅者时发送失败属正常场景
        let _ = self.signals.send(signal);
    }
}
